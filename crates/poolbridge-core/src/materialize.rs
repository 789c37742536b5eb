// ── Object materializer ──
//
// Creates the store namespace for every observed entity: one channel per
// object, one state per field, and the relay control entries. All
// creations are create-if-absent and independent of each other; a failed
// creation is logged and retried on a later cycle.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use strum::Display;
use tracing::{debug, info, warn};

use crate::model::{Category, DataObject, Field, RelayEntry, ScalarValue, Snapshot, SystemInfo};
use crate::store::{ObjectStore, Role, SmartName, SmartType, StoreObject, ValueType, paths};

/// Labels that name a light rather than a generic switch.
pub const LIGHT_LABEL_PATTERN: &str = r"(?i)light|bulb|licht|leucht";

static LIGHT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LIGHT_LABEL_PATTERN).expect("light label pattern is valid"));

/// What a relay drives, judged from its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LabelKind {
    #[strum(serialize = "light")]
    Light,
    #[strum(serialize = "switch")]
    Switch,
}

impl LabelKind {
    fn smart_type(self) -> SmartType {
        match self {
            Self::Light => SmartType::Light,
            Self::Switch => SmartType::Switch,
        }
    }

    fn switch_role(self) -> Role {
        match self {
            Self::Light => Role::Light,
            Self::Switch => Role::Switch,
        }
    }
}

pub fn classify_label(label: &str) -> LabelKind {
    if LIGHT_LABEL.is_match(label) {
        LabelKind::Light
    } else {
        LabelKind::Switch
    }
}

/// Whether `object` gets `auto`/`onOff`/timer entries: internal relays
/// always, external relays only while the bank is enabled.
pub fn has_relay_controls(object: &DataObject, sys_info: &SystemInfo) -> bool {
    match object.category {
        Category::Relays => true,
        Category::ExternalRelays => sys_info.is_external_relays_enabled(),
        _ => false,
    }
}

// ── Metadata table ──────────────────────────────────────────────────

fn field_object(object: &DataObject, field: Field) -> StoreObject {
    let name = paths::entry_name(&object.label, field);
    match field {
        Field::Value if object.category == Category::Temperatures => {
            StoreObject::state(name, Role::Temperature, ValueType::Number)
                .with_unit(format!("°{}", object.unit))
                .with_smart_name(object.active.then(|| SmartName {
                    name: object.label.clone(),
                    smart_type: SmartType::Thermostat,
                }))
        }
        Field::Category | Field::Label | Field::Unit | Field::DisplayValue => {
            StoreObject::state(name, Role::Text, ValueType::String)
        }
        Field::Active => StoreObject::state(name, Role::Indicator, ValueType::Boolean),
        Field::Id | Field::CategoryId | Field::Value => {
            StoreObject::state(name, Role::Value, ValueType::Number)
        }
    }
}

fn relay_entry_object(object: &DataObject, entry: RelayEntry, dosage: bool) -> StoreObject {
    let name = paths::entry_name(&object.label, entry);
    let kind = classify_label(&object.label);
    match entry {
        RelayEntry::Auto => StoreObject::state(name, Role::AutoModeSwitch, ValueType::Boolean)
            .writable()
            .with_smart_name(object.active.then(|| SmartName {
                name: object.label.clone(),
                smart_type: kind.smart_type(),
            })),
        RelayEntry::OnOff => {
            let state = StoreObject::state(name, kind.switch_role(), ValueType::Boolean);
            if dosage { state } else { state.writable() }
        }
        RelayEntry::Timer | RelayEntry::DosageTimer => {
            StoreObject::state(name, Role::Interval, ValueType::Number).write_only()
        }
    }
}

fn sys_value_object(key: &str, value: &ScalarValue) -> StoreObject {
    let (role, value_type) = match value {
        ScalarValue::Bool(_) => (Role::Indicator, ValueType::Boolean),
        ScalarValue::Number(_) => (Role::Value, ValueType::Number),
        ScalarValue::Text(_) => (Role::Text, ValueType::String),
    };
    StoreObject::state(key, role, value_type)
}

const DERIVED_FLAGS: [(&str, &str); 4] = [
    (paths::CHLORINE_DOSAGE_ENABLED, "Chlorine dosage enabled"),
    (paths::PH_MINUS_DOSAGE_ENABLED, "pH- dosage enabled"),
    (paths::PH_PLUS_DOSAGE_ENABLED, "pH+ dosage enabled"),
    (paths::ELECTROLYSIS_ENABLED, "Electrolysis enabled"),
];

// ── Report ──────────────────────────────────────────────────────────

/// Outcome counts of one materialization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.existing += other.existing;
        self.failed += other.failed;
    }
}

// ── Materializer ────────────────────────────────────────────────────

pub struct Materializer {
    store: Arc<dyn ObjectStore>,
    /// Objects whose whole namespace exists.
    known_objects: HashSet<u32>,
    /// Objects materialized at least once, complete or not.
    attempted: HashSet<u32>,
    /// Objects completed on a later pass; their values must be rewritten.
    refreshed: Vec<u32>,
    /// `info.system` paths that exist.
    known_sys_paths: HashSet<String>,
    external_relays_enabled: bool,
}

impl Materializer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            known_objects: HashSet::new(),
            attempted: HashSet::new(),
            refreshed: Vec::new(),
            known_sys_paths: HashSet::new(),
            external_relays_enabled: false,
        }
    }

    pub fn is_known(&self, id: u32) -> bool {
        self.known_objects.contains(&id)
    }

    /// Ids whose namespace was completed or extended on a pass after their
    /// first one, since the last call. Entries created then hold no value
    /// yet.
    pub fn take_refreshed(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.refreshed)
    }

    async fn create(&self, path: &str, object: StoreObject, report: &mut MaterializeReport) -> bool {
        match self.store.ensure_object(path, object).await {
            Ok(true) => {
                report.created += 1;
                true
            }
            Ok(false) => {
                report.existing += 1;
                true
            }
            Err(e) => {
                report.failed += 1;
                warn!(path, error = %e, "failed to create store object");
                false
            }
        }
    }

    /// The `info` channel and the connectivity flag.
    pub async fn ensure_connection_schema(&self) -> MaterializeReport {
        let mut report = MaterializeReport::default();
        self.create("info", StoreObject::channel("Information", serde_json::Value::Null), &mut report)
            .await;
        self.create(
            paths::CONNECTION,
            StoreObject::state("Device connected", Role::Connected, ValueType::Boolean),
            &mut report,
        )
        .await;
        report
    }

    /// One state per system-info key plus the derived dosage flags.
    pub async fn ensure_sys_info_schema(&mut self, sys_info: &SystemInfo) -> MaterializeReport {
        let mut report = MaterializeReport::default();

        let mut wanted: Vec<(String, StoreObject)> = sys_info
            .iter()
            .map(|(key, value)| (paths::system_key(key), sys_value_object(key, value)))
            .collect();
        wanted.extend(DERIVED_FLAGS.iter().map(|(path, name)| {
            (
                (*path).to_owned(),
                StoreObject::state(*name, Role::Indicator, ValueType::Boolean),
            )
        }));
        wanted.retain(|(path, _)| !self.known_sys_paths.contains(path));
        if wanted.is_empty() {
            return report;
        }

        let channel = StoreObject::channel("System", serde_json::Value::Null);
        if !self.create(paths::SYSTEM, channel, &mut report).await {
            return report;
        }
        for (path, object) in wanted {
            if self.create(&path, object, &mut report).await {
                self.known_sys_paths.insert(path);
            }
        }
        report
    }

    /// Namespace for every object not materialized yet.
    pub async fn ensure_object_schema(
        &mut self,
        objects: &[DataObject],
        sys_info: &SystemInfo,
    ) -> MaterializeReport {
        let mut report = MaterializeReport::default();
        for object in objects {
            if self.known_objects.contains(&object.id) {
                continue;
            }
            let retry = !self.attempted.insert(object.id);
            let mut object_report = MaterializeReport::default();
            self.ensure_object(object, sys_info, &mut object_report).await;
            if object_report.is_complete() {
                self.known_objects.insert(object.id);
                if retry && object_report.created > 0 {
                    self.refreshed.push(object.id);
                }
            } else {
                debug!(id = object.id, label = %object.label, "object namespace incomplete, will retry");
            }
            report.merge(object_report);
        }
        report
    }

    async fn ensure_object(
        &self,
        object: &DataObject,
        sys_info: &SystemInfo,
        report: &mut MaterializeReport,
    ) {
        let channel_path = paths::channel(object);
        let native = serde_json::to_value(object).unwrap_or(serde_json::Value::Null);
        if !self
            .create(&channel_path, StoreObject::channel(&object.label, native), report)
            .await
        {
            return;
        }

        for field in Field::all() {
            self.create(&paths::field(object, field), field_object(object, field), report)
                .await;
        }

        if !has_relay_controls(object, sys_info) {
            return;
        }
        let dosage = sys_info.is_dosage_relay(object);
        let timer = if dosage {
            RelayEntry::DosageTimer
        } else {
            RelayEntry::Timer
        };
        for entry in [RelayEntry::Auto, RelayEntry::OnOff, timer] {
            self.create(
                &paths::relay_entry(object, entry),
                relay_entry_object(object, entry, dosage),
                report,
            )
            .await;
        }
    }

    /// Incremental pass for one poll cycle. When the external relay bank
    /// becomes enabled, external relays are revisited so they gain their
    /// control entries.
    pub async fn ensure(&mut self, snapshot: &Snapshot) -> MaterializeReport {
        let enabled = snapshot.sys_info.is_external_relays_enabled();
        if enabled && !self.external_relays_enabled {
            info!("external relay bank enabled");
            for object in snapshot.objects.iter().filter(|o| o.is_external_relay()) {
                self.known_objects.remove(&object.id);
            }
        }
        self.external_relays_enabled = enabled;

        let mut report = self.ensure_sys_info_schema(&snapshot.sys_info).await;
        report.merge(
            self.ensure_object_schema(&snapshot.objects, &snapshot.sys_info)
                .await,
        );
        if report.created > 0 {
            debug!(created = report.created, failed = report.failed, "namespace extended");
        }
        report
    }
}
