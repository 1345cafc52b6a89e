//! English localization bundle and the display-name resolver.

use std::collections::HashMap;

use tracing::warn;

pub type LocaleTable = HashMap<String, String>;

/// Resolve a record's display name.
///
/// When a localized key is present it wins over the raw name; all `@`
/// markup is stripped from the key before the lookup. A key missing from
/// the bundle warns and falls back to the raw name.
pub fn localized_name(name: &str, name_localized: Option<&str>, locale: &LocaleTable) -> String {
    let Some(key) = name_localized else {
        return name.to_string();
    };
    let key = key.replace('@', "");
    match locale.get(&key) {
        Some(label) => label.clone(),
        None => {
            warn!("Missing locale entry '{key}'");
            name.to_string()
        }
    }
}
