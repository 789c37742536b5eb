// ── Best-effort store writer ──
//
// One cycle's store writes, applied in order on a background task. The
// engine does not wait for them; each failure is logged with its path and
// the batch carries on. Nothing is retried.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::ScalarValue;
use crate::store::ObjectStore;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Acknowledged value write.
    SetState { path: String, value: ScalarValue },
    /// Display-name update of an existing object.
    Rename { path: String, name: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

/// What happened to a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub renamed: usize,
    pub failed: usize,
}

impl WriteReport {
    pub fn merge(&mut self, other: Self) {
        self.written += other.written;
        self.renamed += other.renamed;
        self.failed += other.failed;
    }
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, value: impl Into<ScalarValue>) {
        self.ops.push(WriteOp::SetState {
            path: path.into(),
            value: value.into(),
        });
    }

    pub fn rename(&mut self, path: impl Into<String>, name: impl Into<String>) {
        self.ops.push(WriteOp::Rename {
            path: path.into(),
            name: name.into(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operation in order, absorbing failures.
    pub async fn apply(self, store: Arc<dyn ObjectStore>) -> WriteReport {
        let mut report = WriteReport::default();
        for op in self.ops {
            match op {
                WriteOp::SetState { path, value } => {
                    match store.set_state(&path, value, true).await {
                        Ok(()) => report.written += 1,
                        Err(e) => {
                            report.failed += 1;
                            warn!(path, error = %e, "store write failed");
                        }
                    }
                }
                WriteOp::Rename { path, name } => {
                    match store.extend_object_name(&path, &name).await {
                        Ok(()) => report.renamed += 1,
                        Err(e) => {
                            report.failed += 1;
                            warn!(path, error = %e, "store rename failed");
                        }
                    }
                }
            }
        }
        debug!(
            written = report.written,
            renamed = report.renamed,
            failed = report.failed,
            "write batch applied"
        );
        report
    }
}
