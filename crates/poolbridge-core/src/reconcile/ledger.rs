// ── Force-update ledger ──
//
// Object ids whose next reconciliation must be treated as changed, filled
// by the command dispatcher and drained by the reconciler. Owned by the
// engine task, so plain sequential mutation is enough.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ForceUpdateLedger {
    pending: HashSet<u32>,
}

impl ForceUpdateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `id` was already pending.
    pub fn insert(&mut self, id: u32) -> bool {
        self.pending.insert(id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.pending.contains(&id)
    }

    /// Remove each of `ids`. Ids that are not pending are ignored, so an
    /// entry is consumed at most once.
    pub fn consume<'a>(&mut self, ids: impl IntoIterator<Item = &'a u32>) -> usize {
        ids.into_iter().filter(|id| self.pending.remove(id)).count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.pending.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_removes_once() {
        let mut ledger = ForceUpdateLedger::new();
        assert!(ledger.insert(3));
        assert!(!ledger.insert(3));
        ledger.insert(7);

        assert_eq!(ledger.consume(&[3, 9]), 1);
        assert_eq!(ledger.consume(&[3]), 0);
        assert!(!ledger.contains(3));
        assert_eq!(ledger.ids(), vec![7]);
    }
}
