// ── Bridge engine ──
//
// Ties the poll path and the write-intent path together. One task owns the
// engine and handles one event at a time: a poll result runs the
// reconciler, materializer, and store writes; a state change runs the
// dispatcher. The force-update ledger is therefore always observed in
// order without locking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use poolbridge_api::{DeviceApi, PollResult, Poller};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{DispatchOutcome, Dispatcher, Intent};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::materialize::{Materializer, has_relay_controls};
use crate::model::{DataObject, Field, RelayEntry, Snapshot, SystemInfo};
use crate::reconcile::{ForceUpdateLedger, ReconciliationPlan, Reconciler};
use crate::store::{ObjectStore, StateChange, paths};
use crate::writer::{WriteBatch, WriteReport};

/// Poll results waiting for the engine.
const POLL_BUFFER: usize = 4;

// ── Status ───────────────────────────────────────────────────────────

/// Device connectivity as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// Consecutive failed polls since the last success.
    Unreachable { failures: u32 },
}

/// Observable engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub connection: ConnectionState,
    /// Completed poll cycles.
    pub cycles: u64,
    pub last_snapshot_at: Option<DateTime<Utc>>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            cycles: 0,
            last_snapshot_at: None,
        }
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub objects_updated: usize,
    pub renames: usize,
    pub objects_created: usize,
    pub writes_issued: usize,
}

// ── Engine ───────────────────────────────────────────────────────────

pub struct Engine {
    config: EngineConfig,
    device: Arc<dyn DeviceApi>,
    store: Arc<dyn ObjectStore>,
    reconciler: Reconciler,
    ledger: ForceUpdateLedger,
    materializer: Materializer,
    dispatcher: Dispatcher,
    /// Issued write batches still running.
    writes: JoinSet<WriteReport>,
    completed: WriteReport,
    connected: Option<bool>,
    status: watch::Sender<EngineStatus>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        device: Arc<dyn DeviceApi>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let (status, _) = watch::channel(EngineStatus::default());
        Self {
            materializer: Materializer::new(store.clone()),
            dispatcher: Dispatcher::new(device.clone(), store.clone()),
            config,
            device,
            store,
            reconciler: Reconciler::new(),
            ledger: ForceUpdateLedger::new(),
            writes: JoinSet::new(),
            completed: WriteReport::default(),
            connected: None,
            status,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    /// Cancelling this token stops the engine and its poller.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn ledger(&self) -> &ForceUpdateLedger {
        &self.ledger
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Create the connectivity flag and mark the device disconnected.
    pub async fn start(&mut self) {
        info!(address = %self.config.device_address, "starting bridge engine");
        self.materializer.ensure_connection_schema().await;
        self.set_connected(false).await;
    }

    /// Start polling the device on the configured interval. The poller
    /// stops with the engine.
    pub fn spawn_poller(&self) -> (Poller, mpsc::Receiver<PollResult>) {
        Poller::start(
            self.device.clone(),
            self.config.poll_interval,
            self.cancel.child_token(),
            POLL_BUFFER,
        )
    }

    // ── Poll path ───────────────────────────────────────────────────

    /// Reconcile one snapshot into the store.
    ///
    /// The plan is computed before anything is written. Value writes are
    /// issued on a background task and the baseline is replaced right
    /// after, without waiting for them to complete.
    pub async fn process_snapshot(&mut self, snapshot: Snapshot) -> CycleSummary {
        let mut plan = self.reconciler.plan(&snapshot, &self.ledger);
        let created = self.materializer.ensure(&snapshot).await;
        for id in self.materializer.take_refreshed() {
            if let Some(object) = snapshot.object(id) {
                debug!(id, label = %object.label, "namespace completed, rewriting values");
                plan.write_all(object);
            }
        }

        let batch = build_batch(&plan, &snapshot.sys_info);
        let summary = CycleSummary {
            objects_updated: plan.objects.len(),
            renames: plan.renames.len(),
            objects_created: created.created,
            writes_issued: batch.len(),
        };
        if !batch.is_empty() {
            self.writes.spawn(batch.apply(self.store.clone()));
        }

        self.reconciler.commit(snapshot, &plan, &mut self.ledger);
        self.reap_writes();
        self.set_connected(true).await;
        self.status.send_modify(|s| {
            s.connection = ConnectionState::Connected;
            s.cycles += 1;
            s.last_snapshot_at = Some(Utc::now());
        });

        debug!(
            updated = summary.objects_updated,
            renames = summary.renames,
            created = summary.objects_created,
            writes = summary.writes_issued,
            "poll cycle reconciled"
        );
        summary
    }

    pub async fn handle_poll_error(&mut self, error: &poolbridge_api::Error) {
        warn!(error = %error, transient = error.is_transient(), "poll failed");
        self.set_connected(false).await;
        self.status.send_modify(|s| {
            s.connection = match s.connection {
                ConnectionState::Unreachable { failures } => ConnectionState::Unreachable {
                    failures: failures.saturating_add(1),
                },
                _ => ConnectionState::Unreachable { failures: 1 },
            };
        });
    }

    // ── Write path ──────────────────────────────────────────────────

    /// Turn a store change into a device command. Acknowledged changes
    /// and non-intent paths are ignored; rejected intents are logged and
    /// dropped.
    pub async fn handle_state_change(&mut self, change: &StateChange) -> Option<DispatchOutcome> {
        let intent = match Intent::from_change(change) {
            Ok(Some(intent)) => intent,
            Ok(None) => return None,
            Err(e) => {
                warn!(path = %change.path, error = %e, "invalid write intent dropped");
                return None;
            }
        };
        match self.dispatch(&intent).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(path = %change.path, error = %e, "write intent dropped");
                None
            }
        }
    }

    pub async fn dispatch(&mut self, intent: &Intent) -> Result<DispatchOutcome, CoreError> {
        let empty = SystemInfo::new();
        let sys_info = self
            .reconciler
            .baseline()
            .map_or(&empty, |snapshot| &snapshot.sys_info);
        self.dispatcher
            .dispatch(intent, sys_info, &mut self.ledger)
            .await
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Process poll results and platform intents until cancelled or either
    /// channel closes, then shut down. `intents` comes from
    /// [`ObjectStore::subscribe_intents`].
    pub async fn run(
        mut self,
        mut polls: mpsc::Receiver<PollResult>,
        mut intents: mpsc::UnboundedReceiver<StateChange>,
    ) -> WriteReport {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = polls.recv() => match result {
                    Some(Ok(snapshot)) => {
                        self.process_snapshot(snapshot).await;
                    }
                    Some(Err(e)) => self.handle_poll_error(&e).await,
                    None => {
                        debug!("poll channel closed");
                        break;
                    }
                },
                change = intents.recv() => match change {
                    Some(change) => {
                        self.handle_state_change(&change).await;
                    }
                    None => {
                        debug!("intent channel closed");
                        break;
                    }
                },
            }
        }
        self.shutdown().await
    }

    /// Stop polling, mark the device disconnected, and let issued writes
    /// finish. Returns the totals of every write batch.
    pub async fn shutdown(&mut self) -> WriteReport {
        self.cancel.cancel();
        self.set_connected(false).await;
        let report = self.flush_writes().await;
        self.status
            .send_modify(|s| s.connection = ConnectionState::Disconnected);
        info!(
            written = report.written,
            failed = report.failed,
            "bridge engine stopped"
        );
        report
    }

    /// Wait for every issued write batch.
    pub async fn flush_writes(&mut self) -> WriteReport {
        while let Some(result) = self.writes.join_next().await {
            self.collect(result);
        }
        self.completed
    }

    fn reap_writes(&mut self) {
        while let Some(result) = self.writes.try_join_next() {
            self.collect(result);
        }
    }

    fn collect(&mut self, result: Result<WriteReport, tokio::task::JoinError>) {
        match result {
            Ok(report) => self.completed.merge(report),
            Err(e) => warn!(error = %e, "write task failed"),
        }
    }

    async fn set_connected(&mut self, connected: bool) {
        if self.connected == Some(connected) {
            return;
        }
        match self
            .store
            .set_state(paths::CONNECTION, connected.into(), true)
            .await
        {
            Ok(()) => self.connected = Some(connected),
            Err(e) => warn!(path = paths::CONNECTION, error = %e, "failed to update connection flag"),
        }
    }
}

// ── Plan → writes ────────────────────────────────────────────────────

fn build_batch(plan: &ReconciliationPlan, sys_info: &SystemInfo) -> WriteBatch {
    let mut batch = WriteBatch::new();

    for (key, value) in &plan.sys_info {
        batch.set(paths::system_key(key), value.clone());
    }
    if let Some(flags) = plan.dosage_flags {
        batch.set(paths::CHLORINE_DOSAGE_ENABLED, flags.chlorine);
        batch.set(paths::PH_MINUS_DOSAGE_ENABLED, flags.ph_minus);
        batch.set(paths::PH_PLUS_DOSAGE_ENABLED, flags.ph_plus);
        batch.set(paths::ELECTROLYSIS_ENABLED, flags.electrolysis);
    }

    for rename in &plan.renames {
        push_renames(&mut batch, &rename.object, sys_info);
    }

    for update in &plan.objects {
        let object = &update.object;
        for &field in &update.fields {
            batch.set(paths::field(object, field), field.read(object));
        }
        if update.writes(Field::Value) && has_relay_controls(object, sys_info) {
            let state = object.relay_state();
            batch.set(paths::relay_entry(object, RelayEntry::Auto), state.auto);
            batch.set(paths::relay_entry(object, RelayEntry::OnOff), state.on);
        }
    }
    batch
}

/// Rename the channel and every entry under it to follow a new label.
fn push_renames(batch: &mut WriteBatch, object: &DataObject, sys_info: &SystemInfo) {
    let label = &object.label;
    batch.rename(paths::channel(object), label.as_str());
    for field in Field::all() {
        batch.rename(paths::field(object, field), paths::entry_name(label, field));
    }
    if has_relay_controls(object, sys_info) {
        let timer = if sys_info.is_dosage_relay(object) {
            RelayEntry::DosageTimer
        } else {
            RelayEntry::Timer
        };
        for entry in [RelayEntry::Auto, RelayEntry::OnOff, timer] {
            batch.rename(paths::relay_entry(object, entry), paths::entry_name(label, entry));
        }
    }
}
