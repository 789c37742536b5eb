//! `poolbridge run`: drive the engine against the simulated device and an
//! in-memory store.

use std::sync::Arc;

use poolbridge_api::SimulatedDevice;
use poolbridge_core::{Engine, EngineStatus, MemoryStore, ObjectStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

use super::{config_file, load};

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_file(global);
    let mut cfg = load(global)?;
    if let Some(fixture) = args.fixture.clone() {
        cfg.device.fixture = Some(fixture);
    }
    if let Some(interval) = args.interval {
        cfg.device.poll_interval_secs = interval;
    }

    let engine_config = cfg
        .to_engine_config()
        .map_err(|e| CliError::from_config(e, &path))?;
    let fixture = cfg.device.fixture.clone().ok_or_else(|| CliError::NoFixture {
        path: path.display().to_string(),
    })?;
    let device = SimulatedDevice::from_fixture(&fixture)
        .map_err(|source| CliError::Fixture {
            path: fixture.display().to_string(),
            source,
        })?
        .with_confirmation_lag(cfg.device.confirmation_lag);

    let store = Arc::new(MemoryStore::with_capacity(engine_config.intent_buffer));
    let mut engine = Engine::new(engine_config, Arc::new(device), store.clone());
    engine.start().await;

    let mut status = engine.status();
    let cancel = engine.cancel_token();
    let (poller, polls) = engine.spawn_poller();
    let task = tokio::spawn(engine.run(polls, store.subscribe_intents()));

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            interrupt.cancel();
        }
    });

    let outcome = drive(&args, store.as_ref(), &mut status, &cancel).await;
    cancel.cancel();
    let report = task
        .await
        .map_err(|e| CliError::Internal(format!("engine task failed: {e}")))?;
    poller.join().await;
    outcome?;

    info!(
        cycles = status.borrow().cycles,
        written = report.written,
        failed = report.failed,
        "run finished"
    );
    if args.dump {
        println!("{}", serde_json::to_string_pretty(&store.to_json())?);
    }
    Ok(())
}

/// Inject the requested writes after the first cycle, then wait for the
/// cycle limit or an interrupt.
async fn drive(
    args: &RunArgs,
    store: &MemoryStore,
    status: &mut watch::Receiver<EngineStatus>,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    if !args.set.is_empty() {
        if !wait_for_cycles(status, cancel, 1).await {
            return Ok(());
        }
        for assignment in &args.set {
            store
                .set_state(&assignment.path, assignment.value.clone(), false)
                .await?;
            info!(path = %assignment.path, value = %assignment.value, "platform write injected");
        }
    }

    match args.cycles {
        Some(limit) => {
            wait_for_cycles(status, cancel, limit).await;
        }
        None => cancel.cancelled().await,
    }
    Ok(())
}

/// Returns `false` if the run was cancelled first.
async fn wait_for_cycles(
    status: &mut watch::Receiver<EngineStatus>,
    cancel: &CancellationToken,
    cycles: u64,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        reached = status.wait_for(|s| s.cycles >= cycles) => reached.is_ok(),
    }
}
