// ── Store object types ──
//
// Metadata describing one node of the hierarchical namespace (a channel or
// a state) plus the stored state value itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::model::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Channel,
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    String,
    Boolean,
}

/// Semantic role of a state, as understood by the automation platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum Role {
    #[serde(rename = "value")]
    #[strum(serialize = "value")]
    Value,
    #[serde(rename = "value.temperature")]
    #[strum(serialize = "value.temperature")]
    Temperature,
    #[serde(rename = "text")]
    #[strum(serialize = "text")]
    Text,
    #[serde(rename = "indicator")]
    #[strum(serialize = "indicator")]
    Indicator,
    #[serde(rename = "indicator.connected")]
    #[strum(serialize = "indicator.connected")]
    Connected,
    #[serde(rename = "switch")]
    #[strum(serialize = "switch")]
    Switch,
    #[serde(rename = "switch.light")]
    #[strum(serialize = "switch.light")]
    Light,
    #[serde(rename = "switch.mode.auto")]
    #[strum(serialize = "switch.mode.auto")]
    AutoModeSwitch,
    #[serde(rename = "level.interval")]
    #[strum(serialize = "level.interval")]
    Interval,
}

/// Voice-assistant style exposure of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SmartType {
    Thermostat,
    Light,
    Switch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartName {
    pub name: String,
    pub smart_type: SmartType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCommon {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    pub read: bool,
    pub write: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_name: Option<SmartName>,
}

/// One namespace node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreObject {
    pub kind: ObjectKind,
    pub common: ObjectCommon,
    #[serde(default)]
    pub native: serde_json::Value,
}

impl StoreObject {
    pub fn channel(name: impl Into<String>, native: serde_json::Value) -> Self {
        Self {
            kind: ObjectKind::Channel,
            common: ObjectCommon {
                name: name.into(),
                role: None,
                value_type: None,
                read: true,
                write: false,
                unit: None,
                smart_name: None,
            },
            native,
        }
    }

    /// A read-only state; adjust with the builder methods below.
    pub fn state(name: impl Into<String>, role: Role, value_type: ValueType) -> Self {
        Self {
            kind: ObjectKind::State,
            common: ObjectCommon {
                name: name.into(),
                role: Some(role),
                value_type: Some(value_type),
                read: true,
                write: false,
                unit: None,
                smart_name: None,
            },
            native: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn writable(mut self) -> Self {
        self.common.write = true;
        self
    }

    /// Accepts writes but never reports a value back.
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.common.read = false;
        self.common.write = true;
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        self.common.unit = (!unit.is_empty()).then_some(unit);
        self
    }

    #[must_use]
    pub fn with_smart_name(mut self, smart_name: Option<SmartName>) -> Self {
        self.common.smart_name = smart_name;
        self
    }
}

/// A stored state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(rename = "val")]
    pub value: ScalarValue,
    pub ack: bool,
    pub ts: DateTime<Utc>,
}

/// Broadcast for every `set_state`. Unacknowledged changes are platform
/// write intents; acknowledged ones echo a confirmed value.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub path: String,
    pub value: ScalarValue,
    pub ack: bool,
}
