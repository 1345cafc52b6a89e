use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use bitflags::bitflags;
use std::io::{Cursor, Seek, Write};

pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
pub const FOURCC_DX10: [u8; 4] = *b"DX10";

/// D3D10_RESOURCE_DIMENSION_TEXTURE2D
pub const RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;
/// D3D10_RESOURCE_MISC_TEXTURECUBE
pub const MISC_TEXTURECUBE: u32 = 0x4;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DdsFlags: u32 {
        const CAPS = 0x1;
        const HEIGHT = 0x2;
        const WIDTH = 0x4;
        const PITCH = 0x8;
        const PIXELFORMAT = 0x1000;
        const MIPMAPCOUNT = 0x20000;
        const LINEARSIZE = 0x80000;
        const DEPTH = 0x800000;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DdsCaps: u32 {
        const COMPLEX = 0x8;
        const MIPMAP = 0x400000;
        const TEXTURE = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PixelFormatFlags: u32 {
        const ALPHAPIXELS = 0x1;
        const ALPHA = 0x2;
        const FOURCC = 0x4;
        const RGB = 0x40;
        const YUV = 0x200;
        const LUMINANCE = 0x20000;
    }
}

#[derive(BinRead, BinWrite, Debug, Clone)]
pub struct DdsPixelFormat {
    #[br(assert(size == 32, "Pixel format size must be 32, got {}", size))]
    pub size: u32,
    #[br(map = PixelFormatFlags::from_bits_retain)]
    #[bw(map = |f| f.bits())]
    pub flags: PixelFormatFlags,
    pub fourcc: [u8; 4],
    pub rgb_bit_count: u32,
    pub r_bitmask: u32,
    pub g_bitmask: u32,
    pub b_bitmask: u32,
    pub a_bitmask: u32,
}

/// The 124-byte legacy header that directly follows the `DDS ` magic.
#[derive(BinRead, BinWrite, Debug, Clone)]
pub struct DdsHeader {
    #[br(assert(size == 124, "Header size must be 124, got {}", size))]
    pub size: u32,
    #[br(map = DdsFlags::from_bits_retain)]
    #[bw(map = |f| f.bits())]
    pub flags: DdsFlags,
    pub height: u32,
    pub width: u32,
    /// Byte pitch of the top mip for uncompressed formats, total top-mip size
    /// for block-compressed ones.
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    #[br(map = DdsCaps::from_bits_retain)]
    #[bw(map = |f| f.bits())]
    pub caps: DdsCaps,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
} // Total size: 124

/// DX10 extension header, present when the pixel format fourCC is `DX10`.
#[derive(BinRead, BinWrite, Debug, Clone)]
pub struct DdsHeaderDx10 {
    /// DXGI_FORMAT of the payload
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
} // Total size: 20

/// Parameters of a texture whose pixel payload exists without a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub mipmap_count: u32,
    pub dxgi_format: u32,
    pub cubemap: bool,
}

/// Wraps a raw pixel payload into a self-describing DX10 DDS file.
///
/// The result is always magic + 124-byte header + 20-byte DX10 extension +
/// payload; downstream decoders need no further metadata.
pub fn synthesize(info: &TextureInfo, payload: &[u8]) -> Vec<u8> {
    let mut flags = DdsFlags::CAPS | DdsFlags::HEIGHT | DdsFlags::WIDTH | DdsFlags::PIXELFORMAT;
    let mut caps = DdsCaps::TEXTURE;
    if info.mipmap_count > 1 {
        flags |= DdsFlags::MIPMAPCOUNT;
        caps |= DdsCaps::COMPLEX | DdsCaps::MIPMAP;
    }
    flags |= DdsFlags::LINEARSIZE;

    let header = DdsHeader {
        size: 124,
        flags,
        height: info.height,
        width: info.width,
        pitch_or_linear_size: payload.len() as u32,
        depth: 0,
        mipmap_count: info.mipmap_count,
        reserved1: [0; 11],
        pixel_format: DdsPixelFormat {
            size: 32,
            flags: PixelFormatFlags::FOURCC,
            fourcc: FOURCC_DX10,
            rgb_bit_count: 0,
            r_bitmask: 0,
            g_bitmask: 0,
            b_bitmask: 0,
            a_bitmask: 0,
        },
        caps,
        caps2: 0,
        caps3: 0,
        caps4: 0,
        reserved2: 0,
    };

    let dx10 = DdsHeaderDx10 {
        dxgi_format: info.dxgi_format,
        resource_dimension: RESOURCE_DIMENSION_TEXTURE2D,
        misc_flag: if info.cubemap { MISC_TEXTURECUBE } else { 0 },
        array_size: 1,
        misc_flags2: 0,
    };

    let mut out = Cursor::new(Vec::with_capacity(4 + 124 + 20 + payload.len()));
    out.write_all(DDS_MAGIC).unwrap();
    out.write_le(&header).unwrap();
    out.write_le(&dx10).unwrap();
    out.write_all(payload).unwrap();
    out.into_inner()
}

/// A parsed DDS file, borrowing nothing: the payload is the byte range after
/// the headers.
#[derive(Debug, Clone)]
pub struct Dds {
    pub header: DdsHeader,
    pub dx10: Option<DdsHeaderDx10>,
    /// Offset of the first payload byte from the start of the file
    pub data_offset: usize,
}

impl Dds {
    pub fn parse(data: &[u8]) -> anyhow::Result<Self> {
        let mut r = Cursor::new(data);
        let magic: [u8; 4] = r.read_le()?;
        if &magic != DDS_MAGIC {
            anyhow::bail!("Not a DDS file (magic {:02x?})", magic);
        }
        let header: DdsHeader = r.read_le()?;
        let dx10 = if header.pixel_format.flags.contains(PixelFormatFlags::FOURCC)
            && header.pixel_format.fourcc == FOURCC_DX10
        {
            Some(r.read_le::<DdsHeaderDx10>()?)
        } else {
            None
        };
        Ok(Self {
            header,
            dx10,
            data_offset: r.stream_position()? as usize,
        })
    }

    pub fn info(&self) -> Option<TextureInfo> {
        let dx10 = self.dx10.as_ref()?;
        Some(TextureInfo {
            width: self.header.width,
            height: self.header.height,
            mipmap_count: self.header.mipmap_count,
            dxgi_format: dx10.dxgi_format,
            cubemap: dx10.misc_flag & MISC_TEXTURECUBE != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> TextureInfo {
        TextureInfo {
            width: 256,
            height: 256,
            mipmap_count: 9,
            dxgi_format: 0x1C,
            cubemap: false,
        }
    }

    #[test]
    fn synthesized_layout() {
        let payload = vec![0xAAu8; 1000];
        let out = synthesize(&info(), &payload);
        assert_eq!(out.len(), 4 + 124 + 20 + payload.len());
        assert_eq!(&out[0..4], b"DDS ");
        // fourCC sits at magic + offset_of(pixel_format.fourcc) = 4 + 72 + 8
        assert_eq!(&out[84..88], b"DX10");
    }

    #[test]
    fn round_trip() {
        let payload = vec![1u8, 2, 3, 4];
        let out = synthesize(
            &TextureInfo {
                cubemap: true,
                ..info()
            },
            &payload,
        );
        let dds = Dds::parse(&out).unwrap();
        assert_eq!(dds.data_offset, 148);
        assert_eq!(dds.header.pitch_or_linear_size, payload.len() as u32);
        let parsed = dds.info().unwrap();
        assert_eq!(
            parsed,
            TextureInfo {
                cubemap: true,
                ..info()
            }
        );
    }

    #[test]
    fn cubemap_flag_only_when_set() {
        let out = synthesize(&info(), &[0u8; 16]);
        let dds = Dds::parse(&out).unwrap();
        assert_eq!(dds.dx10.unwrap().misc_flag, 0);
    }
}
