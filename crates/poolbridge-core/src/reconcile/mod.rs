// ── Snapshot reconciliation ──
//
// Diffs each poll result against the retained baseline. `reconcile` is pure;
// `Reconciler` owns the baseline and the bootstrap flag and only mutates
// them in `commit`, after the cycle's writes have been issued.

mod ledger;
mod plan;

use std::collections::{HashMap, HashSet};

use tracing::debug;

pub use ledger::ForceUpdateLedger;
pub use plan::{ObjectUpdate, ReconciliationPlan, RenameAction, UpdateReason};

use crate::model::{DataObject, Field, Snapshot};

/// Compute the store updates that take the store from `previous` to
/// `current`.
///
/// An object is planned when there is no baseline yet, when it is new,
/// when its id is pending in `ledger`, or when a tracked field changed.
/// Label changes additionally produce a [`RenameAction`].
pub fn reconcile(
    previous: Option<&Snapshot>,
    current: &Snapshot,
    ledger: &ForceUpdateLedger,
    bootstrapped: bool,
) -> ReconciliationPlan {
    let baseline = previous.filter(|_| bootstrapped);
    let mut plan = ReconciliationPlan::default();

    // ── System info ──────────────────────────────────────────────────
    match baseline {
        None => {
            plan.sys_info = current
                .sys_info
                .iter()
                .map(|(k, v)| (k.to_owned(), v.clone()))
                .collect();
            plan.dosage_flags = Some(current.sys_info.dosage_flags());
        }
        Some(prev) => {
            plan.sys_info = current
                .sys_info
                .iter()
                .filter(|(k, v)| prev.sys_info.get(k) != Some(*v))
                .map(|(k, v)| (k.to_owned(), v.clone()))
                .collect();
            if prev.sys_info.dosage_control() != current.sys_info.dosage_control() {
                plan.dosage_flags = Some(current.sys_info.dosage_flags());
            }
        }
    }

    // ── Objects ──────────────────────────────────────────────────────
    let previous_by_id: HashMap<u32, &DataObject> = baseline
        .map(|prev| prev.objects.iter().map(|o| (o.id, o)).collect())
        .unwrap_or_default();
    let mut seen = HashSet::new();

    for object in &current.objects {
        if !seen.insert(object.id) {
            debug!(id = object.id, "duplicate object id in snapshot, skipping");
            continue;
        }

        let forced = ledger.contains(object.id);
        if forced {
            plan.forced.push(object.id);
        }

        let update = match (baseline, previous_by_id.get(&object.id)) {
            (None, _) => Some((Field::all(), UpdateReason::Bootstrap)),
            (Some(_), None) => Some((Field::all(), UpdateReason::New)),
            (Some(_), Some(prev)) => {
                if prev.label != object.label {
                    plan.renames.push(RenameAction {
                        object: object.clone(),
                        previous_label: prev.label.clone(),
                    });
                }
                if forced {
                    Some((Field::all(), UpdateReason::Forced))
                } else {
                    let changed = changed_fields(prev, object);
                    (!changed.is_empty()).then_some((changed, UpdateReason::Changed))
                }
            }
        };

        if let Some((fields, reason)) = update {
            plan.objects.push(ObjectUpdate {
                object: object.clone(),
                fields,
                reason,
            });
        }
    }

    plan
}

/// Tracked fields that differ between two versions of one object, in
/// `Field` order.
fn changed_fields(previous: &DataObject, current: &DataObject) -> Vec<Field> {
    Field::all()
        .into_iter()
        .filter(|f| Field::TRACKED.contains(f) && f.differs(previous, current))
        .collect()
}

// ── Reconciler ──────────────────────────────────────────────────────

/// Owner of the baseline snapshot and the bootstrap flag.
#[derive(Debug, Default)]
pub struct Reconciler {
    baseline: Option<Snapshot>,
    bootstrapped: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    pub fn plan(&self, current: &Snapshot, ledger: &ForceUpdateLedger) -> ReconciliationPlan {
        reconcile(self.baseline.as_ref(), current, ledger, self.bootstrapped)
    }

    /// Accept `current` as the new baseline and drain the ledger entries
    /// the plan matched. Call only after the plan's writes were issued.
    pub fn commit(
        &mut self,
        current: Snapshot,
        plan: &ReconciliationPlan,
        ledger: &mut ForceUpdateLedger,
    ) {
        let consumed = ledger.consume(&plan.forced);
        if consumed > 0 {
            debug!(consumed, remaining = ledger.len(), "force-update entries consumed");
        }
        self.baseline = Some(current);
        self.bootstrapped = true;
    }
}
