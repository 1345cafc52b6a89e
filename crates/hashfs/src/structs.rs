use binrw::BinRead;

use crate::comp::Compression;
use crate::{Error, Result};

pub const MAGIC: [u8; 4] = *b"SCS#";
pub const HASH_METHOD_CITY: [u8; 4] = *b"CITY";

/// Fixed-size V2 header at offset 0.
///
/// The magic is a plain field rather than a `br(magic)` so that an archive
/// with a wrong tag can still be opened and probed with `is_valid`.
#[derive(BinRead, Debug, Clone)]
pub struct HashFsHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub salt: u16,
    pub hash_method: [u8; 4],
    pub entry_count: u32,
    pub entry_table_compressed_size: u32,
    /// Uncompressed size of the metadata table
    pub metadata_table_size: u32,
    pub metadata_table_compressed_size: u32,
    pub entry_table_offset: u64,
    pub metadata_table_offset: u64,
    pub security_descriptor_offset: u64,
    pub platform: u8,
}

/// One row of the V2 entry table.
#[derive(BinRead, Debug, Clone, Copy)]
pub struct EntryRecord {
    /// CityHash64 of the entry's salted virtual path
    pub hash: u64,
    pub metadata_index: u32,
    /// 1 for plain files and directories, 3 for texture objects
    pub metadata_count: u16,
    pub flags: u8,
    pub reserved: u8,
} // Total size: 16

impl EntryRecord {
    pub fn is_directory(&self) -> bool {
        self.flags & 1 != 0
    }
}

pub mod meta_kind {
    pub const IMG: u8 = 1;
    pub const SAMPLE: u8 = 2;
    pub const MIP_PROXY: u8 = 3;
    pub const INLINE_DIRECTORY: u8 = 4;
    pub const PMA_INFO: u8 = 5;
    pub const PMG_INFO: u8 = 6;
    pub const MIP_0: u8 = 130;
    pub const MIP_1: u8 = 131;
    /// Set on kinds whose payload is a 16-byte plain pointer
    pub const PLAIN: u8 = 0x80;
    pub const DIRECTORY: u8 = 0x81;
    pub const MIP_TAIL: u8 = 0x84;
}

/// 4-byte header in the metadata table: a 24-bit payload index (in 4-byte
/// units) plus an 8-bit kind tag.
#[derive(BinRead, Debug, Clone, Copy)]
pub struct MetadataHeader(pub u32);

impl MetadataHeader {
    pub fn payload_index(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    pub fn kind(&self) -> u8 {
        (self.0 >> 24) as u8
    }
}

/// 16-byte pointer to an entry's bytes: where they live in the archive and
/// how they are compressed. The offset is stored divided by 16.
#[derive(Debug, Clone, Copy)]
pub struct PlainMeta {
    pub compressed_size: u32,
    pub compression: Compression,
    pub uncompressed_size: u32,
    pub offset: u64,
}

impl PlainMeta {
    pub const SIZE: usize = 16;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            return Err(Error::Malformed(format!(
                "plain metadata payload truncated to {} bytes",
                raw.len()
            )));
        }
        let tag = raw[3] >> 4;
        Ok(Self {
            compressed_size: u32::from_le_bytes([raw[0], raw[1], raw[2], 0]),
            compression: Compression::from_nibble(tag).ok_or(Error::UnknownCompression(tag))?,
            uncompressed_size: u32::from_le_bytes([raw[4], raw[5], raw[6], 0]),
            offset: u32::from_le_bytes(raw[12..16].try_into().unwrap()) as u64 * 16,
        })
    }
}

/// 8-byte image descriptor attached to texture-object entries.
#[derive(BinRead, Debug, Clone, Copy)]
pub struct ImageMeta {
    width_minus_one: u16,
    height_minus_one: u16,
    packed: u32,
}

impl ImageMeta {
    pub const SIZE: usize = 8;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            return Err(Error::Malformed(format!(
                "image metadata payload truncated to {} bytes",
                raw.len()
            )));
        }
        Ok(Self {
            width_minus_one: u16::from_le_bytes(raw[0..2].try_into().unwrap()),
            height_minus_one: u16::from_le_bytes(raw[2..4].try_into().unwrap()),
            packed: u32::from_le_bytes(raw[4..8].try_into().unwrap()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width_minus_one as u32 + 1
    }

    pub fn height(&self) -> u32 {
        self.height_minus_one as u32 + 1
    }

    pub fn mipmap_count(&self) -> u32 {
        (self.packed & 0xF) + 1
    }

    /// DXGI pixel format of the payload
    pub fn format(&self) -> u32 {
        (self.packed >> 4) & 0xFF
    }

    pub fn is_cubemap(&self) -> bool {
        (self.packed >> 12) & 0x3 != 0
    }

    pub fn array_count(&self) -> u32 {
        ((self.packed >> 14) & 0x3F) + 1
    }

    pub fn pitch_alignment(&self) -> u32 {
        1 << ((self.packed >> 20) & 0xF)
    }

    pub fn image_alignment(&self) -> u32 {
        1 << ((self.packed >> 24) & 0xF)
    }

    pub fn texture_info(&self) -> rigmap_dds::TextureInfo {
        rigmap_dds::TextureInfo {
            width: self.width(),
            height: self.height(),
            mipmap_count: self.mipmap_count(),
            dxgi_format: self.format(),
            cubemap: self.is_cubemap(),
        }
    }
}

/// 4-byte sampler descriptor attached to texture-object entries.
#[derive(BinRead, Debug, Clone, Copy)]
pub struct SampleMeta {
    packed: u32,
}

impl SampleMeta {
    pub const SIZE: usize = 4;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            return Err(Error::Malformed(format!(
                "sampler metadata payload truncated to {} bytes",
                raw.len()
            )));
        }
        Ok(Self {
            packed: u32::from_le_bytes(raw[0..4].try_into().unwrap()),
        })
    }

    pub fn mag_filter(&self) -> u32 {
        self.packed & 0x1
    }

    pub fn min_filter(&self) -> u32 {
        (self.packed >> 1) & 0x1
    }

    pub fn mip_filter(&self) -> u32 {
        (self.packed >> 2) & 0x3
    }

    pub fn address_u(&self) -> u32 {
        (self.packed >> 4) & 0x7
    }

    pub fn address_v(&self) -> u32 {
        (self.packed >> 7) & 0x7
    }

    pub fn address_w(&self) -> u32 {
        (self.packed >> 10) & 0x7
    }
}

/// 8-byte geometry-info descriptor (`PMA_INFO` / `PMG_INFO`). Opaque here;
/// carried so the metadata walk stays exhaustive.
#[derive(Debug, Clone, Copy)]
pub struct GeometryMeta(pub u64);

impl GeometryMeta {
    pub const SIZE: usize = 8;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            return Err(Error::Malformed(format!(
                "geometry metadata payload truncated to {} bytes",
                raw.len()
            )));
        }
        Ok(Self(u64::from_le_bytes(raw[0..8].try_into().unwrap())))
    }
}

/// 12-byte framing header in front of every tiled-deflate payload.
#[derive(BinRead, Debug, Clone, Copy)]
pub struct TileStreamHeader {
    pub id: u8,
    pub magic: u8,
    pub num_tiles: u16,
    pub tile_size_idx: u32,
    pub last_tile_size: u32,
} // Total size: 12

impl TileStreamHeader {
    pub const SIZE: usize = 12;
    pub const ID: u8 = 4;

    pub fn validate(&self) -> Result<()> {
        if self.id != Self::ID || self.magic != !Self::ID {
            return Err(Error::TileStream(format!(
                "bad tile-stream id/magic: {:#04x}/{:#04x}",
                self.id, self.magic
            )));
        }
        Ok(())
    }
}
