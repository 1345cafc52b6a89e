//! Pack version and locale bundle reads.

use anyhow::Context;
use rigmap_hashfs::Overlay;
use rigmap_map::locale::LocaleTable;
use serde_json::Value;

const VERSION_PATHS: &[&str] = &["version.scs.txt", "version.txt"];
const LOCALE_PATHS: &[&str] = &["locale/en_us/local.sii", "locale/en_us/local.override.sii"];

/// First line of the pack version file, if any archive carries one.
pub fn read_version(overlay: &mut Overlay) -> anyhow::Result<Option<String>> {
    for path in VERSION_PATHS {
        if let Some(data) = overlay.read_path(path)? {
            let text = String::from_utf8_lossy(&data);
            return Ok(text.lines().next().map(|line| line.trim().to_string()));
        }
    }
    Ok(None)
}

/// The English key/value localization bundle.
pub fn read_locale(overlay: &mut Overlay) -> anyhow::Result<LocaleTable> {
    let mut table = LocaleTable::new();
    for path in LOCALE_PATHS {
        let Some(data) = overlay.read_path(path)? else {
            debug!("Locale file '{path}' not present");
            continue;
        };
        let value = crate::sii::decode(&data)
            .with_context(|| format!("Failed to decode locale file '{path}'"))?;
        collect_pairs(&value, &mut table);
    }
    if table.is_empty() {
        warn!("No locale entries found");
    }
    Ok(table)
}

/// Locale units hold parallel `key[]`/`val[]` arrays.
fn collect_pairs(value: &Value, table: &mut LocaleTable) {
    let Value::Object(map) = value else {
        return;
    };
    if let (Some(Value::Array(keys)), Some(Value::Array(vals))) = (map.get("key"), map.get("val"))
    {
        for (k, v) in keys.iter().zip(vals) {
            if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
                table.insert(k.to_string(), v.to_string());
            }
        }
    }
    for child in map.values() {
        collect_pairs(child, table);
    }
}
