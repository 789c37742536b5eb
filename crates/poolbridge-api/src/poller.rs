// ── Periodic poller ──
//
// Drives `DeviceApi::poll` on a fixed interval and forwards each outcome
// (snapshot or failure) over an mpsc channel. Failures never stop the
// loop; only cancellation or a dropped receiver does.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::device::DeviceApi;
use crate::error::Error;
use crate::model::Snapshot;

/// Outcome of one poll cycle.
pub type PollResult = Result<Snapshot, Error>;

/// Handle to a running poll loop.
pub struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Begin polling `device` every `interval`. The first poll fires
    /// immediately. Results arrive on the returned receiver in order.
    pub fn start(
        device: Arc<dyn DeviceApi>,
        interval: Duration,
        cancel: CancellationToken,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<PollResult>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(poll_task(device, interval, cancel.clone(), tx));
        (Self { cancel, handle }, rx)
    }

    /// Signal the loop to stop. No snapshot is forwarded after this call.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop and wait for the loop to exit.
    pub async fn join(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "poll task ended abnormally");
        }
    }
}

async fn poll_task(
    device: Arc<dyn DeviceApi>,
    interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<PollResult>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = device.poll() => result,
        };

        if let Err(ref e) = result {
            warn!(error = %e, "device poll failed");
        }
        if cancel.is_cancelled() || tx.send(result).await.is_err() {
            break;
        }
    }

    debug!("poll loop stopped");
}
