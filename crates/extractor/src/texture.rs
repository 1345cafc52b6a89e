//! Texture-container decoding for UI icons.
//!
//! Only the straight 8-bit RGBA/BGRA layouts the icon materials actually
//! use are handled; anything else is reported unsupported. SDF materials
//! carry an auxiliary coefficient table which the raster decode ignores.

use anyhow::Context;
use image::RgbaImage;
use serde_json::Value;

const DXGI_FORMAT_R8G8B8A8_UNORM: u32 = 28;
const DXGI_FORMAT_R8G8B8A8_UNORM_SRGB: u32 = 29;
const DXGI_FORMAT_B8G8R8A8_UNORM: u32 = 87;
const DXGI_FORMAT_B8G8R8A8_UNORM_SRGB: u32 = 91;

/// Decode a DDS container blob into an RGBA raster (top mip only).
pub fn decode_dds(data: &[u8], sdf_aux: Option<&Value>) -> anyhow::Result<RgbaImage> {
    let dds = rigmap_dds::Dds::parse(data)?;
    let info = dds
        .info()
        .context("container has no DX10 extension header")?;
    if let Some(aux) = sdf_aux {
        debug!("Ignoring SDF auxiliary table ({} rows)", aux.as_array().map_or(0, |a| a.len()));
    }

    let size = info.width as usize * info.height as usize * 4;
    let payload = data
        .get(dds.data_offset..dds.data_offset + size)
        .context("payload shorter than the top mip")?;

    let mut pixels = payload.to_vec();
    match info.dxgi_format {
        DXGI_FORMAT_R8G8B8A8_UNORM | DXGI_FORMAT_R8G8B8A8_UNORM_SRGB => {}
        DXGI_FORMAT_B8G8R8A8_UNORM | DXGI_FORMAT_B8G8R8A8_UNORM_SRGB => {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        other => anyhow::bail!("Unsupported DXGI format {other}"),
    }

    RgbaImage::from_raw(info.width, info.height, pixels)
        .context("pixel buffer does not match the image dimensions")
}

pub fn encode_png(image: &RgbaImage) -> anyhow::Result<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(out.into_inner())
}
