// ── Store path scheme ──
//
// `<category>.<categoryId>` channels with one state per field or relay
// control entry, plus the fixed `info.*` paths.

use crate::model::{DataObject, Field, RelayEntry};

pub const CONNECTION: &str = "info.connection";
pub const SYSTEM: &str = "info.system";

pub const CHLORINE_DOSAGE_ENABLED: &str = "info.system.isChlorineDosageEnabled";
pub const PH_MINUS_DOSAGE_ENABLED: &str = "info.system.isPhMinusDosageEnabled";
pub const PH_PLUS_DOSAGE_ENABLED: &str = "info.system.isPhPlusDosageEnabled";
pub const ELECTROLYSIS_ENABLED: &str = "info.system.isElectrolysis";

pub fn system_key(key: &str) -> String {
    format!("{SYSTEM}.{key}")
}

pub fn channel(object: &DataObject) -> String {
    format!("{}.{}", object.category, object.category_id)
}

pub fn field(object: &DataObject, field: Field) -> String {
    format!("{}.{field}", channel(object))
}

pub fn relay_entry(object: &DataObject, entry: RelayEntry) -> String {
    format!("{}.{entry}", channel(object))
}

/// Display name of a per-object entry.
pub fn entry_name(label: &str, entry: impl std::fmt::Display) -> String {
    format!("{label} {entry}")
}

/// Split a state path into its channel and final segment.
pub fn split_entry(path: &str) -> Option<(&str, &str)> {
    let (channel, entry) = path.rsplit_once('.')?;
    (!channel.is_empty() && !entry.is_empty()).then_some((channel, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn relay() -> DataObject {
        DataObject {
            id: 17,
            category: Category::ExternalRelays,
            category_id: 2,
            label: "Light".into(),
            value: 0.0,
            display_value: String::new(),
            unit: String::new(),
            active: true,
        }
    }

    #[test]
    fn object_paths() {
        assert_eq!(channel(&relay()), "externalRelays.2");
        assert_eq!(field(&relay(), Field::DisplayValue), "externalRelays.2.displayValue");
        assert_eq!(relay_entry(&relay(), RelayEntry::OnOff), "externalRelays.2.onOff");
        assert_eq!(system_key("version"), "info.system.version");
    }

    #[test]
    fn split_entry_takes_last_segment() {
        assert_eq!(split_entry("relays.1.auto"), Some(("relays.1", "auto")));
        assert_eq!(split_entry("auto"), None);
        assert_eq!(split_entry("relays.1."), None);
    }
}
