// ── Domain model ──
//
// The snapshot types come from the device layer unchanged. This module adds
// the explicit field enumeration the reconciler and materializer share, so
// nothing iterates an object's shape by name at runtime.

use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

pub use poolbridge_api::model::{
    Category, DataObject, DosageFlags, DosageTarget, RelayState, ScalarValue, Snapshot,
    SystemInfo, sys_keys,
};

// ── Field ───────────────────────────────────────────────────────────

/// A per-object state entry (`<category>.<categoryId>.<field>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum Field {
    #[strum(serialize = "id")]
    Id,
    #[strum(serialize = "category")]
    Category,
    #[strum(serialize = "categoryId")]
    CategoryId,
    #[strum(serialize = "label")]
    Label,
    #[strum(serialize = "value")]
    Value,
    #[strum(serialize = "displayValue")]
    DisplayValue,
    #[strum(serialize = "unit")]
    Unit,
    #[strum(serialize = "active")]
    Active,
}

impl Field {
    /// Every field, in materialization order.
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }

    /// Fields whose change between two snapshots triggers an update.
    pub const TRACKED: [Self; 6] = [
        Self::Value,
        Self::Category,
        Self::Label,
        Self::Unit,
        Self::DisplayValue,
        Self::Active,
    ];

    /// Current value of this field on `object`.
    pub fn read(self, object: &DataObject) -> ScalarValue {
        match self {
            Self::Id => object.id.into(),
            Self::Category => object.category.as_ref().into(),
            Self::CategoryId => object.category_id.into(),
            Self::Label => object.label.as_str().into(),
            Self::Value => object.value.into(),
            Self::DisplayValue => object.display_value.as_str().into(),
            Self::Unit => object.unit.as_str().into(),
            Self::Active => object.active.into(),
        }
    }

    /// Whether `a` and `b` disagree on this field.
    pub fn differs(self, a: &DataObject, b: &DataObject) -> bool {
        match self {
            Self::Id => a.id != b.id,
            Self::Category => a.category != b.category,
            Self::CategoryId => a.category_id != b.category_id,
            Self::Label => a.label != b.label,
            Self::Value => a.value.to_bits() != b.value.to_bits(),
            Self::DisplayValue => a.display_value != b.display_value,
            Self::Unit => a.unit != b.unit,
            Self::Active => a.active != b.active,
        }
    }
}

// ── RelayEntry ──────────────────────────────────────────────────────

/// Control entries that exist only under relay channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum RelayEntry {
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "onOff")]
    OnOff,
    #[strum(serialize = "timer")]
    Timer,
    #[strum(serialize = "dosageTimer")]
    DosageTimer,
}
