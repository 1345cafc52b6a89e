//! Material-to-icon extraction.
//!
//! Scans the UI material directories, resolves each descriptor's texture
//! reference and decodes it to a raster keyed by the stripped file name.

use std::collections::HashMap;

use anyhow::Context;
use image::RgbaImage;
use indicatif::ProgressBar;
use rigmap_hashfs::Overlay;
use serde_json::Value;

use crate::{sii, texture};

/// The facility/landmark/UI icons pulled from `material/ui/map`.
pub const MAP_ICON_NAMES: &[&str] = &[
    "viewpoint",
    "photo_sight_captured",
    "parking_ico",
    "gas_ico",
    "service_ico",
    "weigh_station_ico",
    "dealer_ico",
    "garage_large_ico",
    "recruitment_ico",
    "city_names_ico",
    "companies_ico",
    "road_numbers_ico",
];

pub fn extract_icons(overlay: &mut Overlay) -> anyhow::Result<HashMap<String, RgbaImage>> {
    let mut icons = HashMap::new();

    scan(overlay, "material/ui/map/road", &mut icons, |name| {
        name.strip_prefix("road_")
            .and_then(|n| n.strip_suffix(".mat"))
            .map(str::to_string)
    })?;
    scan(overlay, "material/ui/company/small", &mut icons, |name| {
        name.strip_suffix(".mat").map(str::to_string)
    })?;
    scan(overlay, "material/ui/map", &mut icons, |name| {
        let key = name.strip_suffix(".mat")?;
        MAP_ICON_NAMES.contains(&key).then(|| key.to_string())
    })?;

    info!("Decoded {} icons", icons.len());
    Ok(icons)
}

fn scan(
    overlay: &mut Overlay,
    dir: &str,
    icons: &mut HashMap<String, RgbaImage>,
    key_of: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let Some(listing) = overlay.list_dir(dir)? else {
        warn!("Icon directory '{dir}' not found");
        return Ok(());
    };

    let progress = ProgressBar::new(listing.files.len() as u64);
    for file in &listing.files {
        progress.inc(1);
        let Some(key) = key_of(file) else {
            continue;
        };
        let path = format!("{dir}/{file}");
        match decode_material(overlay, dir, &path) {
            Ok(Some(image)) => {
                icons.insert(key, image);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to decode icon '{path}': {e:#}"),
        }
    }
    progress.finish_and_clear();
    Ok(())
}

fn decode_material(
    overlay: &mut Overlay,
    dir: &str,
    mat_path: &str,
) -> anyhow::Result<Option<RgbaImage>> {
    let Some(data) = overlay.read_path(mat_path)? else {
        return Ok(None);
    };
    let mat = sii::decode(&data).context("Failed to decode material descriptor")?;
    let Some(reference) = texture_reference(&mat) else {
        warn!("'{mat_path}': unrecognized material shape");
        return Ok(None);
    };

    let tobj_path = resolve_reference(dir, &reference.path);
    let Some(blob) = read_texture(overlay, &tobj_path)? else {
        warn!("'{mat_path}': texture '{tobj_path}' not found");
        return Ok(None);
    };
    texture::decode_dds(&blob, reference.sdf_aux.as_ref()).map(Some)
}

struct TextureReference {
    path: String,
    /// SDF coefficient table from `ui.sdf.rfx` materials
    sdf_aux: Option<Value>,
}

fn texture_reference(mat: &Value) -> Option<TextureReference> {
    if let Some(effect) = mat.get("effect") {
        let e = effect.get("ui.rfx").or_else(|| effect.get("ui.sdf.rfx"))?;
        let path = e.get("texture").and_then(|t| {
            t.as_str().map(str::to_string).or_else(|| {
                // `texture : "<name>" { source : "..." }` nests one level
                t.as_object()?
                    .values()
                    .next()?
                    .get("source")?
                    .as_str()
                    .map(str::to_string)
            })
        })?;
        return Some(TextureReference {
            path,
            sdf_aux: e.get("aux").cloned(),
        });
    }
    let path = mat.get("material")?.get("ui")?.get("texture")?.as_str()?;
    Some(TextureReference {
        path: path.to_string(),
        sdf_aux: None,
    })
}

/// Texture references are relative to the material's directory unless they
/// start with `/`.
fn resolve_reference(dir: &str, reference: &str) -> String {
    match reference.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{dir}/{reference}"),
    }
}

/// Fetch the container blob for a texture reference. A texture-object entry
/// synthesizes its own container on read; everywhere else the payload lives
/// in the sibling `.dds` file.
fn read_texture(overlay: &mut Overlay, tobj_path: &str) -> anyhow::Result<Option<Vec<u8>>> {
    if overlay.serves_texture_objects(tobj_path)? {
        return Ok(overlay.read_path(tobj_path)?);
    }
    if let Some(dds_path) = tobj_path.strip_suffix(".tobj").map(|p| format!("{p}.dds")) {
        if let Some(data) = overlay.read_path(&dds_path)? {
            return Ok(Some(data));
        }
    }
    Ok(overlay.read_path(tobj_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigmap_dds::TextureInfo;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn dds_blob() -> Vec<u8> {
        rigmap_dds::synthesize(
            &TextureInfo {
                width: 1,
                height: 1,
                mipmap_count: 1,
                dxgi_format: 28,
                cubemap: false,
            },
            &[255, 0, 0, 255],
        )
    }

    fn overlay_from_zip(files: &[(&str, &[u8])]) -> (tempfile::TempDir, Overlay) {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.zip");
        std::fs::write(&path, bytes).unwrap();

        let mut overlay = Overlay::new();
        overlay.add_mount(Box::new(crate::fs::zip::ZipFs::open(&path).unwrap()));
        (dir, overlay)
    }

    #[test]
    fn road_and_company_and_allowlist_scan() {
        let road_mat = b"material : \"ui\" {\n\ttexture : \"road_one.tobj\"\n}\n";
        let company_mat = b"material : \"ui\" {\n\ttexture : \"acme.tobj\"\n}\n";
        let vp_mat = b"material : \"ui\" {\n\ttexture : \"viewpoint.tobj\"\n}\n";
        let other_mat = b"material : \"ui\" {\n\ttexture : \"other.tobj\"\n}\n";
        let dds = dds_blob();
        let (_dir, mut overlay) = overlay_from_zip(&[
            ("material/ui/map/road/road_one.mat", road_mat.as_slice()),
            ("material/ui/map/road/road_one.dds", &dds),
            ("material/ui/company/small/acme.mat", company_mat.as_slice()),
            ("material/ui/company/small/acme.dds", &dds),
            ("material/ui/map/viewpoint.mat", vp_mat.as_slice()),
            ("material/ui/map/viewpoint.dds", &dds),
            // Not on the allowlist; must be skipped.
            ("material/ui/map/other.mat", other_mat.as_slice()),
            ("material/ui/map/other.dds", &dds),
        ]);

        let icons = extract_icons(&mut overlay).unwrap();
        let mut keys: Vec<&String> = icons.keys().collect();
        keys.sort();
        assert_eq!(keys, ["acme", "one", "viewpoint"]);
        assert_eq!(icons["one"].get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn effect_material_with_sdf_aux() {
        let mat = b"effect : \"ui.sdf.rfx\" {\n\ttexture : \"texture_name\" {\n\t\tsource : \"acme.tobj\"\n\t}\n\taux[0] : (1.0, 2.0)\n}\n";
        let dds = dds_blob();
        let (_dir, mut overlay) = overlay_from_zip(&[
            ("material/ui/company/small/acme.mat", mat.as_slice()),
            ("material/ui/company/small/acme.dds", &dds),
        ]);
        let icons = extract_icons(&mut overlay).unwrap();
        assert!(icons.contains_key("acme"));
    }

    #[test]
    fn absolute_reference_is_respected() {
        let mat = b"material : \"ui\" {\n\ttexture : \"/material/ui/shared.tobj\"\n}\n";
        let dds = dds_blob();
        let (_dir, mut overlay) = overlay_from_zip(&[
            ("material/ui/company/small/acme.mat", mat.as_slice()),
            ("material/ui/shared.dds", &dds),
        ]);
        let icons = extract_icons(&mut overlay).unwrap();
        assert!(icons.contains_key("acme"));
    }

    #[test]
    fn unknown_material_shape_is_skipped() {
        let mat = b"material : \"window\" {\n\ttexture : \"x.tobj\"\n}\n";
        let (_dir, mut overlay) =
            overlay_from_zip(&[("material/ui/company/small/acme.mat", mat.as_slice())]);
        let icons = extract_icons(&mut overlay).unwrap();
        assert!(icons.is_empty());
    }
}
