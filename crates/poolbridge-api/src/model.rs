// ── Snapshot model ──
//
// One poll result from the pool controller: system info plus the list of
// typed data objects. Immutable once produced -- the device layer builds a
// fresh `Snapshot` every cycle and hands ownership to the consumer.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// ── ScalarValue ─────────────────────────────────────────────────────

/// A scalar reported by the device or written to the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ScalarValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            Self::Text(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Non-negative integral view, used for bitmasks and channel ids.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_f64().and_then(f64_to_u32)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for ScalarValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn f64_to_u32(n: f64) -> Option<u32> {
    (n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX)).then(|| n.trunc() as u32)
}

// ── Category ────────────────────────────────────────────────────────

/// Object class as reported by the device. The string form is the
/// first segment of every store path (`<category>.<categoryId>.<field>`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[non_exhaustive]
pub enum Category {
    #[serde(rename = "time")]
    #[strum(serialize = "time")]
    Time,
    #[serde(rename = "analog")]
    #[strum(serialize = "analog")]
    Analog,
    #[serde(rename = "electrodes")]
    #[strum(serialize = "electrodes")]
    Electrodes,
    #[serde(rename = "temperatures")]
    #[strum(serialize = "temperatures")]
    Temperatures,
    #[serde(rename = "relays")]
    #[strum(serialize = "relays")]
    Relays,
    #[serde(rename = "digitalInput")]
    #[strum(serialize = "digitalInput")]
    DigitalInput,
    #[serde(rename = "externalRelays")]
    #[strum(serialize = "externalRelays")]
    ExternalRelays,
    #[serde(rename = "canister")]
    #[strum(serialize = "canister")]
    Canister,
    #[serde(rename = "canisterConsumptions")]
    #[strum(serialize = "canisterConsumptions")]
    CanisterConsumptions,
}

impl Category {
    pub fn is_relay(self) -> bool {
        matches!(self, Self::Relays | Self::ExternalRelays)
    }
}

// ── DataObject ──────────────────────────────────────────────────────

/// One observed entity (sensor or relay).
///
/// `id` is globally unique and stable across polls. `(category,
/// category_id)` is the store address and is stable as long as the device
/// configuration is. `label` is device-assigned and may change at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
    pub id: u32,
    pub category: Category,
    pub category_id: u32,
    pub label: String,
    pub value: f64,
    pub display_value: String,
    #[serde(default)]
    pub unit: String,
    pub active: bool,
}

/// Relay channels are numbered across both banks; the external bank
/// starts after the eight internal relays.
pub const EXTERNAL_RELAY_OFFSET: u32 = 8;

const RELAY_ON_BIT: u32 = 0x01;
const RELAY_MANUAL_BIT: u32 = 0x02;

impl DataObject {
    pub fn is_relay(&self) -> bool {
        self.category.is_relay()
    }

    pub fn is_external_relay(&self) -> bool {
        self.category == Category::ExternalRelays
    }

    /// Physical relay channel: `categoryId`, shifted past the internal
    /// bank for external relays. Saturates on out-of-range ids.
    pub fn relay_channel(&self) -> u32 {
        if self.is_external_relay() {
            self.category_id.saturating_add(EXTERNAL_RELAY_OFFSET)
        } else {
            self.category_id
        }
    }

    /// Channel addressed by the generic timer command (1-based).
    pub fn timer_channel(&self) -> u32 {
        self.relay_channel().saturating_add(1)
    }

    /// Decode the relay byte: bit 0 is the output, bit 1 is manual mode.
    pub fn relay_state(&self) -> RelayState {
        let raw = f64_to_u32(self.value).unwrap_or(0);
        RelayState {
            auto: raw & RELAY_MANUAL_BIT == 0,
            on: raw & RELAY_ON_BIT != 0,
        }
    }
}

/// Boundary representation of the OFF / ON / AUTO tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayState {
    pub auto: bool,
    pub on: bool,
}

impl RelayState {
    /// Raw relay byte for this state.
    pub fn raw(self) -> u32 {
        let mut raw = 0;
        if !self.auto {
            raw |= RELAY_MANUAL_BIT;
        }
        if self.on {
            raw |= RELAY_ON_BIT;
        }
        raw
    }
}

// ── SystemInfo ──────────────────────────────────────────────────────

pub mod sys_keys {
    pub const VERSION: &str = "version";
    pub const DOSAGE_CONTROL: &str = "dosageControl";
    pub const CONFIG_OTHER_ENABLE: &str = "configOtherEnable";
    pub const CHLORINE_DOSAGE_RELAY: &str = "chlorineDosageRelais";
    pub const PH_MINUS_DOSAGE_RELAY: &str = "phMinusDosageRelais";
    pub const PH_PLUS_DOSAGE_RELAY: &str = "phPlusDosageRelais";
}

const DOSAGE_CHLORINE_BIT: u32 = 0x0000_0001;
const DOSAGE_PH_MINUS_BIT: u32 = 0x0000_0100;
const DOSAGE_PH_PLUS_BIT: u32 = 0x0000_1000;
const DOSAGE_ELECTROLYSIS_BIT: u32 = 0x0001_0000;
const EXTERNAL_RELAYS_BIT: u32 = 0x0000_0004;

/// Named scalar counters and flags reported by the device, in device order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemInfo {
    values: IndexMap<String, ScalarValue>,
}

impl SystemInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ScalarValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn number(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(ScalarValue::as_u32)
    }

    /// Dosage-control bitmask; absent means nothing enabled.
    pub fn dosage_control(&self) -> u32 {
        self.number(sys_keys::DOSAGE_CONTROL).unwrap_or(0)
    }

    pub fn dosage_flags(&self) -> DosageFlags {
        DosageFlags::from_bitmask(self.dosage_control())
    }

    pub fn is_external_relays_enabled(&self) -> bool {
        self.number(sys_keys::CONFIG_OTHER_ENABLE)
            .is_some_and(|bits| bits & EXTERNAL_RELAYS_BIT != 0)
    }

    /// Map a relay channel onto the dosage command it drives, if any.
    pub fn dosage_target(&self, channel: u32) -> Option<DosageTarget> {
        [
            (sys_keys::CHLORINE_DOSAGE_RELAY, DosageTarget::Chlorine),
            (sys_keys::PH_MINUS_DOSAGE_RELAY, DosageTarget::PhMinus),
            (sys_keys::PH_PLUS_DOSAGE_RELAY, DosageTarget::PhPlus),
        ]
        .into_iter()
        .find_map(|(key, target)| (self.number(key) == Some(channel)).then_some(target))
    }

    pub fn is_dosage_relay(&self, object: &DataObject) -> bool {
        object.is_relay() && self.dosage_target(object.relay_channel()).is_some()
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> FromIterator<(K, V)> for SystemInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The four booleans derived from the dosage-control bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosageFlags {
    pub chlorine: bool,
    pub ph_minus: bool,
    pub ph_plus: bool,
    pub electrolysis: bool,
}

impl DosageFlags {
    pub fn from_bitmask(bits: u32) -> Self {
        Self {
            chlorine: bits & DOSAGE_CHLORINE_BIT != 0,
            ph_minus: bits & DOSAGE_PH_MINUS_BIT != 0,
            ph_plus: bits & DOSAGE_PH_PLUS_BIT != 0,
            electrolysis: bits & DOSAGE_ELECTROLYSIS_BIT != 0,
        }
    }
}

/// Dosage command channel a dosage relay is driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DosageTarget {
    #[strum(serialize = "chlorine")]
    Chlorine,
    #[strum(serialize = "pH-")]
    PhMinus,
    #[strum(serialize = "pH+")]
    PhPlus,
}

// ── Snapshot ────────────────────────────────────────────────────────

/// One complete poll result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sys_info: SystemInfo,
    pub objects: Vec<DataObject>,
}

impl Snapshot {
    pub fn object(&self, id: u32) -> Option<&DataObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn find(&self, category: Category, category_id: u32) -> Option<&DataObject> {
        self.objects
            .iter()
            .find(|o| o.category == category && o.category_id == category_id)
    }

    /// Load a snapshot from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn relay(category: Category, category_id: u32, value: f64) -> DataObject {
        DataObject {
            id: 16 + category_id,
            category,
            category_id,
            label: "Pump".into(),
            value,
            display_value: String::new(),
            unit: String::new(),
            active: true,
        }
    }

    #[test]
    fn category_string_forms_match_store_paths() {
        assert_eq!(Category::ExternalRelays.to_string(), "externalRelays");
        assert_eq!(Category::Temperatures.as_ref(), "temperatures");
        assert_eq!(Category::from_str("relays").unwrap(), Category::Relays);
        assert!(Category::from_str("bogus").is_err());
    }

    #[test]
    fn relay_channel_offsets_external_bank() {
        assert_eq!(relay(Category::Relays, 3, 0.0).relay_channel(), 3);
        assert_eq!(relay(Category::Relays, 3, 0.0).timer_channel(), 4);
        assert_eq!(relay(Category::ExternalRelays, 3, 0.0).relay_channel(), 11);
        assert_eq!(relay(Category::ExternalRelays, 3, 0.0).timer_channel(), 12);
    }

    #[test]
    fn channel_ids_saturate_on_huge_category_ids() {
        let external = DataObject {
            category_id: u32::MAX - 2,
            ..relay(Category::ExternalRelays, 0, 0.0)
        };
        assert_eq!(external.relay_channel(), u32::MAX);
        assert_eq!(external.timer_channel(), u32::MAX);

        let internal = DataObject {
            category_id: u32::MAX,
            ..relay(Category::Relays, 0, 0.0)
        };
        assert_eq!(internal.timer_channel(), u32::MAX);
    }

    #[test]
    fn relay_state_decodes_manual_and_on_bits() {
        let decode = |v| relay(Category::Relays, 0, v).relay_state();
        assert_eq!(decode(0.0), RelayState { auto: true, on: false });
        assert_eq!(decode(1.0), RelayState { auto: true, on: true });
        assert_eq!(decode(2.0), RelayState { auto: false, on: false });
        assert_eq!(decode(3.0), RelayState { auto: false, on: true });
        assert_eq!(RelayState { auto: false, on: true }.raw(), 3);
    }

    #[test]
    fn dosage_flags_follow_bitmask() {
        let info: SystemInfo = [(sys_keys::DOSAGE_CONTROL, 0x0001_1001_u32)]
            .into_iter()
            .collect();
        let flags = info.dosage_flags();
        assert!(flags.chlorine);
        assert!(!flags.ph_minus);
        assert!(flags.ph_plus);
        assert!(flags.electrolysis);
        assert_eq!(SystemInfo::new().dosage_flags(), DosageFlags::default());
    }

    #[test]
    fn dosage_target_matches_configured_relays() {
        let info: SystemInfo = [
            (sys_keys::CHLORINE_DOSAGE_RELAY, 5_u32),
            (sys_keys::PH_MINUS_DOSAGE_RELAY, 6),
            (sys_keys::PH_PLUS_DOSAGE_RELAY, 7),
        ]
        .into_iter()
        .collect();
        assert_eq!(info.dosage_target(5), Some(DosageTarget::Chlorine));
        assert_eq!(info.dosage_target(6), Some(DosageTarget::PhMinus));
        assert_eq!(info.dosage_target(7), Some(DosageTarget::PhPlus));
        assert_eq!(info.dosage_target(1), None);
        assert!(info.is_dosage_relay(&relay(Category::Relays, 5, 0.0)));
        assert!(!info.is_dosage_relay(&relay(Category::ExternalRelays, 5, 0.0)));
    }

    #[test]
    fn external_relays_flag_reads_config_bit() {
        let mut info = SystemInfo::new();
        assert!(!info.is_external_relays_enabled());
        info.insert(sys_keys::CONFIG_OTHER_ENABLE, 4_u32);
        assert!(info.is_external_relays_enabled());
    }

    #[test]
    fn snapshot_json_uses_camel_case() {
        let raw = r#"{
            "sysInfo": { "version": "1.7.6", "dosageControl": 4097 },
            "objects": [{
                "id": 16, "category": "relays", "categoryId": 0,
                "label": "Pump", "value": 1, "displayValue": "on",
                "unit": "", "active": true
            }]
        }"#;
        let snap = Snapshot::from_json(raw).unwrap();
        assert_eq!(snap.sys_info.dosage_control(), 4097);
        assert_eq!(
            snap.sys_info.get("version"),
            Some(&ScalarValue::Text("1.7.6".into()))
        );
        assert_eq!(snap.find(Category::Relays, 0).unwrap().id, 16);
        assert!(snap.object(17).is_none());
    }
}
