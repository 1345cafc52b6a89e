//! Per-map sector file aggregation.
//!
//! Every map tile is backed by a `.base` and optionally a `.aux` file named
//! after its sector key (`sec+0010-0015`). Both are parsed by the external
//! sector parser and merged into per-sector UID maps.

use std::collections::HashMap;

use anyhow::Context;
use rigmap_hashfs::Overlay;
use tracing::{debug, error, info};

use crate::items::{Item, Node};

/// What the external sector parser yields for one `.base`/`.aux` file.
pub struct SectorContent {
    pub items: Vec<Item>,
    pub nodes: Vec<Node>,
}

pub trait SectorParser {
    fn parse(&self, data: &[u8]) -> anyhow::Result<SectorContent>;
}

#[derive(Default)]
pub struct Sector {
    pub x: i32,
    pub y: i32,
    pub items_by_uid: HashMap<u64, Item>,
    pub nodes_by_uid: HashMap<u64, Node>,
}

pub struct SectorBundle {
    pub sectors: HashMap<(i32, i32), Sector>,
    /// All discovered map names joined with `+`
    pub map: String,
    /// Set when any sector failed to parse; the failing sector contributes
    /// nothing but the rest of the bundle is usable.
    pub errors: bool,
}

/// Parse a `sec[+-]DDDD[+-]DDDD` sector key into its signed coordinates.
pub fn parse_sector_key(key: &str) -> Option<(i32, i32)> {
    let rest = key.strip_prefix("sec")?;
    if rest.len() != 10 || !rest.is_ascii() {
        return None;
    }
    let group = |s: &str| -> Option<i32> {
        let (sign, digits) = s.split_at(1);
        if !matches!(sign, "+" | "-") || digits.len() != 4 {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: i32 = digits.parse().ok()?;
        Some(if sign == "-" { -value } else { value })
    };
    Some((group(&rest[0..5])?, group(&rest[5..10])?))
}

/// The platform default map when `map/` has no subdirectories.
pub fn default_map_name(game_id: &str) -> &'static str {
    match game_id {
        "ats" => "usa",
        _ => "europe",
    }
}

pub fn read_sectors(
    overlay: &mut Overlay,
    parser: &dyn SectorParser,
    game_id: &str,
) -> anyhow::Result<SectorBundle> {
    let map_names = match overlay.list_dir("map")? {
        Some(listing) if !listing.subdirs.is_empty() => listing.subdirs,
        _ => vec![default_map_name(game_id).to_string()],
    };

    let mut sectors: HashMap<(i32, i32), Sector> = HashMap::new();
    let mut errors = false;

    for map_name in &map_names {
        let dir = format!("map/{map_name}");
        let Some(listing) = overlay.list_dir(&dir)? else {
            error!("Map directory '{dir}' not found");
            errors = true;
            continue;
        };

        let mut sector_files: Vec<&String> = listing
            .files
            .iter()
            .filter(|f| f.ends_with(".base") || f.ends_with(".aux"))
            .collect();
        sector_files.sort();
        info!("'{map_name}': {} sector files", sector_files.len());

        for file in sector_files {
            let key = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
            let Some((sector_x, sector_y)) = parse_sector_key(key) else {
                error!("Malformed sector key '{key}' in '{dir}'");
                errors = true;
                continue;
            };

            let path = format!("{dir}/{file}");
            let result = overlay
                .read_path(&path)?
                .context("sector file vanished between listing and read")
                .and_then(|data| parser.parse(&data));
            let content = match result {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to parse sector '{path}': {e:#}");
                    errors = true;
                    continue;
                }
            };
            debug!(
                "'{path}': {} items, {} nodes",
                content.items.len(),
                content.nodes.len()
            );

            let sector = sectors.entry((sector_x, sector_y)).or_insert_with(|| Sector {
                x: sector_x,
                y: sector_y,
                ..Default::default()
            });
            for mut item in content.items {
                item.sector_x = sector_x;
                item.sector_y = sector_y;
                sector.items_by_uid.insert(item.uid, item);
            }
            for mut node in content.nodes {
                node.sector_x = sector_x;
                node.sector_y = sector_y;
                sector.nodes_by_uid.insert(node.uid, node);
            }
        }
    }

    Ok(SectorBundle {
        sectors,
        map: map_names.join("+"),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ItemKind, RoadItem};
    use crate::test_util::InMemoryArchive;

    /// Interprets the first payload byte as a UID and yields one road item
    /// and one node with it. Empty payloads fail.
    struct FakeParser;

    impl SectorParser for FakeParser {
        fn parse(&self, data: &[u8]) -> anyhow::Result<SectorContent> {
            let uid = *data.first().context("empty sector payload")? as u64;
            Ok(SectorContent {
                items: vec![Item {
                    uid,
                    sector_x: 0,
                    sector_y: 0,
                    kind: ItemKind::Road(RoadItem {
                        road_look_token: "look0".to_string(),
                        start_node_uid: uid,
                        end_node_uid: uid,
                        length: 1.0,
                        dlc_guard: 0,
                        maybe_divided: None,
                    }),
                }],
                nodes: vec![Node {
                    uid,
                    x: uid as f64,
                    y: uid as f64,
                    z: 0.0,
                    rotation: 0.0,
                    forward_item_uid: 0,
                    backward_item_uid: 0,
                    sector_x: 0,
                    sector_y: 0,
                }],
            })
        }
    }

    fn overlay(files: &[(&str, &[u8])]) -> Overlay {
        let mut archive = InMemoryArchive::new();
        archive.add_dir("map", &["montana"], &[]);
        let names: Vec<&str> = files
            .iter()
            .map(|(p, _)| p.rsplit_once('/').unwrap().1)
            .collect();
        archive.add_dir("map/montana", &[], &names);
        for (path, data) in files {
            archive.add_file(path, data);
        }
        let mut overlay = Overlay::new();
        overlay.add_mount(Box::new(archive));
        overlay
    }

    #[test]
    fn aggregates_base_and_aux_files() {
        let mut ov = overlay(&[
            ("map/montana/sec+0001-0002.base", &[10u8]),
            ("map/montana/sec+0001-0002.aux", &[11u8]),
            ("map/montana/sec-0003+0000.base", &[12u8]),
            ("map/montana/readme.txt", b"ignored"),
        ]);
        let bundle = read_sectors(&mut ov, &FakeParser, "ats").unwrap();

        assert_eq!(bundle.map, "montana");
        assert!(!bundle.errors);
        assert_eq!(bundle.sectors.len(), 2);

        let sector = &bundle.sectors[&(1, -2)];
        assert_eq!(sector.items_by_uid.len(), 2);
        assert!(sector.items_by_uid.contains_key(&10));
        assert!(sector.items_by_uid.contains_key(&11));
        assert_eq!(sector.items_by_uid[&10].sector_x, 1);
        assert_eq!(sector.items_by_uid[&10].sector_y, -2);
        assert_eq!(sector.nodes_by_uid[&11].sector_x, 1);

        assert_eq!(bundle.sectors[&(-3, 0)].items_by_uid.len(), 1);
    }

    #[test]
    fn malformed_key_sets_error_flag_but_continues() {
        let mut ov = overlay(&[
            ("map/montana/sec+01-0002.base", &[1u8]),
            ("map/montana/sec+0005+0005.base", &[2u8]),
        ]);
        let bundle = read_sectors(&mut ov, &FakeParser, "ats").unwrap();
        assert!(bundle.errors);
        assert_eq!(bundle.sectors.len(), 1);
        assert!(bundle.sectors.contains_key(&(5, 5)));
    }

    #[test]
    fn parser_failure_sets_error_flag_but_continues() {
        let mut ov = overlay(&[
            ("map/montana/sec+0000+0000.base", &[] as &[u8]),
            ("map/montana/sec+0001+0001.base", &[3u8]),
        ]);
        let bundle = read_sectors(&mut ov, &FakeParser, "ats").unwrap();
        assert!(bundle.errors);
        assert_eq!(bundle.sectors.len(), 1);
    }

    #[test]
    fn missing_map_directory_uses_platform_default() {
        let mut archive = InMemoryArchive::new();
        archive.add_dir("map", &[], &[]);
        let mut ov = Overlay::new();
        ov.add_mount(Box::new(archive));
        let bundle = read_sectors(&mut ov, &FakeParser, "ats").unwrap();
        assert_eq!(bundle.map, "usa");
        // The default directory does not exist either, which is an error.
        assert!(bundle.errors);
    }

    #[test]
    fn sector_keys() {
        assert_eq!(parse_sector_key("sec+0010-0015"), Some((10, -15)));
        assert_eq!(parse_sector_key("sec-0001+0000"), Some((-1, 0)));
        assert_eq!(parse_sector_key("sec+0000+0000"), Some((0, 0)));
        assert_eq!(parse_sector_key("sec+10-15"), None);
        assert_eq!(parse_sector_key("sec+001a+0000"), None);
        assert_eq!(parse_sector_key("sector+0010-0015"), None);
        assert_eq!(parse_sector_key("+0010-0015"), None);
    }

    #[test]
    fn default_maps() {
        assert_eq!(default_map_name("ats"), "usa");
        assert_eq!(default_map_name("eut2"), "europe");
    }
}
