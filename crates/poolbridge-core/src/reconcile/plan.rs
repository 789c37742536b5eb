// ── Reconciliation plan ──
//
// What one poll cycle must write. Built by the reconciler before any store
// write is issued and consumed by the engine.

use strum::Display;

use crate::model::{DataObject, DosageFlags, Field, ScalarValue};

/// Why an object is part of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateReason {
    /// No baseline yet; everything is written.
    Bootstrap,
    /// Seen for the first time after bootstrap.
    New,
    /// Pending in the force-update ledger.
    Forced,
    /// At least one tracked field differs from the baseline.
    Changed,
    /// Store entries were created after the object was first seen.
    Materialized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUpdate {
    pub object: DataObject,
    /// Fields to write, in `Field` order.
    pub fields: Vec<Field>,
    pub reason: UpdateReason,
}

impl ObjectUpdate {
    pub fn writes(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }
}

/// Propagate a new label to an object's channel and every sub-entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameAction {
    pub object: DataObject,
    pub previous_label: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    /// Changed `info.system.<key>` scalars.
    pub sys_info: Vec<(String, ScalarValue)>,
    /// Present when the dosage bitmask changed (or before bootstrap).
    pub dosage_flags: Option<DosageFlags>,
    pub objects: Vec<ObjectUpdate>,
    pub renames: Vec<RenameAction>,
    /// Ledger ids matched this cycle; consumed on commit.
    pub forced: Vec<u32>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.sys_info.is_empty()
            && self.dosage_flags.is_none()
            && self.objects.is_empty()
            && self.renames.is_empty()
    }

    /// Make sure every field of `object` is written this cycle.
    pub fn write_all(&mut self, object: &DataObject) {
        match self.objects.iter_mut().find(|u| u.object.id == object.id) {
            Some(update) => {
                if update.fields.len() < Field::all().len() {
                    update.fields = Field::all();
                    update.reason = UpdateReason::Materialized;
                }
            }
            None => self.objects.push(ObjectUpdate {
                object: object.clone(),
                fields: Field::all(),
                reason: UpdateReason::Materialized,
            }),
        }
    }

    pub fn update_for(&self, id: u32) -> Option<&ObjectUpdate> {
        self.objects.iter().find(|u| u.object.id == id)
    }

    /// Number of scalar store writes the plan implies, excluding derived
    /// relay entries.
    pub fn write_count(&self) -> usize {
        let flags = if self.dosage_flags.is_some() { 4 } else { 0 };
        self.sys_info.len() + flags + self.objects.iter().map(|u| u.fields.len()).sum::<usize>()
    }
}
