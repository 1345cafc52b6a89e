//! Per-entry compression dispatch.
//!
//! Entry payloads carry a 4-bit compression tag; tables are always zlib.
//! Tiled-deflate payloads are framed by a 12-byte tile-stream header that
//! must be stripped before the decoder sees the data.

use std::io::Read;

use binrw::BinReaderExt;
use flate2::read::ZlibDecoder;
use tracing::trace;

use crate::structs::TileStreamHeader;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    /// Raw deflate without the zlib wrapper. Reserved by the format; no
    /// shipped archive is known to use it.
    HeaderlessZlib,
    /// GPU-oriented tiled deflate, prefixed by a tile-stream header.
    Gdeflate,
    /// Reserved by the format; no shipped archive is known to use it.
    Zstd,
}

impl Compression {
    pub fn from_nibble(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Compression::None,
            1 => Compression::Zlib,
            2 => Compression::HeaderlessZlib,
            3 => Compression::Gdeflate,
            4 => Compression::Zstd,
            _ => return None,
        })
    }
}

pub fn decompress(data: &[u8], kind: Compression, uncompressed_size: usize) -> Result<Vec<u8>> {
    trace!("Decompressing {} bytes with {:?}", data.len(), kind);
    match kind {
        Compression::None => {
            if data.len() != uncompressed_size {
                return Err(Error::SizeMismatch {
                    expected: uncompressed_size,
                    actual: data.len(),
                });
            }
            Ok(data.to_vec())
        }
        Compression::Zlib => {
            let mut out = Vec::with_capacity(uncompressed_size);
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompress(format!("zlib: {e}")))?;
            if out.len() != uncompressed_size {
                return Err(Error::SizeMismatch {
                    expected: uncompressed_size,
                    actual: out.len(),
                });
            }
            Ok(out)
        }
        Compression::Gdeflate => decompress_gdeflate(data, uncompressed_size),
        Compression::HeaderlessZlib | Compression::Zstd => {
            Err(Error::UnsupportedCompression(kind))
        }
    }
}

fn decompress_gdeflate(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(data);
    let header: TileStreamHeader = cursor
        .read_le()
        .map_err(|e| Error::TileStream(format!("short tile-stream header: {e}")))?;
    header.validate()?;
    trace!(
        "Tile stream: {} tiles, last tile {} bytes",
        header.num_tiles, header.last_tile_size
    );

    let payload = &data[TileStreamHeader::SIZE..];
    let mut decompressor = gdeflate::Decompressor::new()
        .map_err(|e| Error::Decompress(format!("gdeflate: {e:?}")))?;
    decompressor
        .decompress(payload, uncompressed_size)
        .map_err(|e| Error::Decompress(format!("gdeflate: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression as Level;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Level::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn stored_passthrough() {
        let data = b"stored bytes";
        let out = decompress(data, Compression::None, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn stored_size_mismatch() {
        let err = decompress(b"abc", Compression::None, 4).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn zlib_round_trip() {
        let data = b"a longer string that zlib can actually shrink a bit, repeated repeated";
        let out = decompress(&zlib(data), Compression::Zlib, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn zlib_wrong_declared_size() {
        let data = b"payload";
        let err = decompress(&zlib(data), Compression::Zlib, data.len() + 1).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn reserved_kinds_are_unsupported() {
        for kind in [Compression::HeaderlessZlib, Compression::Zstd] {
            let err = decompress(b"x", kind, 1).unwrap_err();
            assert!(matches!(err, Error::UnsupportedCompression(k) if k == kind));
        }
    }

    #[test]
    fn gdeflate_requires_tile_header() {
        // 5 bytes cannot hold the 12-byte tile-stream header.
        let err = decompress(&[0u8; 5], Compression::Gdeflate, 64).unwrap_err();
        assert!(matches!(err, Error::TileStream(_)));
    }

    #[test]
    fn unknown_nibble_is_rejected() {
        assert_eq!(Compression::from_nibble(4), Some(Compression::Zstd));
        assert_eq!(Compression::from_nibble(5), None);
        assert_eq!(Compression::from_nibble(0xF), None);
    }
}
