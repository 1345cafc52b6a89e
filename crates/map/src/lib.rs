//! Sector aggregation and map assembly.
//!
//! Consumes archives through [`rigmap_hashfs::Overlay`], the external
//! sector parser and the definition dictionaries, and produces the unified
//! map data bundle.

pub mod assemble;
pub mod bundle;
pub mod defs;
pub mod items;
pub mod locale;
pub mod sectors;

pub use assemble::{assemble, only_defs, to_map_position, AssembleOptions};
pub use bundle::{MapBundle, MapData, Poi};
pub use sectors::{read_sectors, SectorBundle, SectorContent, SectorParser};

#[cfg(test)]
pub(crate) mod test_util;
