#![allow(clippy::unwrap_used)]

// End-to-end behavior of the engine against the simulated device and the
// in-memory store.

use std::sync::Arc;

use poolbridge_api::{DeviceCall, RelayCommand, SimulatedDevice, WriteFailure, sys_keys};
use poolbridge_core::store::Role;
use poolbridge_core::{
    Category, ConnectionState, DataObject, DeviceCommand, DispatchOutcome, Engine, EngineConfig,
    Field, Intent, MemoryStore, ObjectStore, ScalarValue, Snapshot, SystemInfo,
};
use pretty_assertions::assert_eq;

fn pump() -> DataObject {
    DataObject {
        id: 1,
        category: Category::Relays,
        category_id: 1,
        label: "Pump".into(),
        value: 0.0,
        display_value: "off".into(),
        unit: String::new(),
        active: true,
    }
}

fn pool_temperature() -> DataObject {
    DataObject {
        id: 40,
        category: Category::Temperatures,
        category_id: 0,
        label: "Pool".into(),
        value: 24.5,
        display_value: "24.5 °C".into(),
        unit: "C".into(),
        active: true,
    }
}

fn snapshot(objects: Vec<DataObject>) -> Snapshot {
    Snapshot {
        sys_info: SystemInfo::from_iter([
            (sys_keys::VERSION, ScalarValue::from("1.6.9")),
            (sys_keys::DOSAGE_CONTROL, ScalarValue::from(0x1_u32)),
        ]),
        objects,
    }
}

struct Harness {
    device: Arc<SimulatedDevice>,
    store: Arc<MemoryStore>,
    engine: Engine,
}

async fn harness(objects: Vec<DataObject>) -> Harness {
    let device = Arc::new(SimulatedDevice::new(snapshot(objects)));
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig::new("http://pool.local").unwrap();
    let mut engine = Engine::new(config, device.clone(), store.clone());
    engine.start().await;
    Harness {
        device,
        store,
        engine,
    }
}

impl Harness {
    /// Poll the device once, reconcile, and wait for the writes.
    async fn cycle(&mut self) {
        let snapshot = poolbridge_api::DeviceApi::poll(self.device.as_ref())
            .await
            .unwrap();
        self.engine.process_snapshot(snapshot).await;
        self.engine.flush_writes().await;
    }
}

#[tokio::test]
async fn initial_poll_materializes_relay_and_writes_values() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;

    assert!(h.store.contains("relays.1"));
    for field in ["value", "label", "unit", "displayValue", "active"] {
        assert!(h.store.contains(&format!("relays.1.{field}")), "{field}");
    }
    for entry in ["auto", "onOff", "timer"] {
        assert!(h.store.contains(&format!("relays.1.{entry}")), "{entry}");
    }
    assert!(!h.store.contains("relays.1.dosageTimer"));

    assert_eq!(h.store.value("relays.1.value"), Some(ScalarValue::Number(0.0)));
    assert_eq!(h.store.value("relays.1.label"), Some(ScalarValue::from("Pump")));
    assert_eq!(h.store.value("relays.1.displayValue"), Some(ScalarValue::from("off")));
    assert_eq!(h.store.value("relays.1.active"), Some(ScalarValue::Bool(true)));
    assert_eq!(h.store.value("relays.1.auto"), Some(ScalarValue::Bool(true)));
    assert_eq!(h.store.value("relays.1.onOff"), Some(ScalarValue::Bool(false)));
    assert_eq!(h.store.value("info.connection"), Some(ScalarValue::Bool(true)));
}

#[tokio::test]
async fn bootstrap_writes_every_field_exactly_once() {
    let mut h = harness(vec![pump(), pool_temperature()]).await;
    h.cycle().await;

    for object in [pump(), pool_temperature()] {
        for field in Field::all() {
            let path = format!("{}.{}.{field}", object.category, object.category_id);
            assert_eq!(h.store.write_count(&path), 1, "{path}");
        }
    }
    assert_eq!(h.store.write_count("info.system.version"), 1);
    assert_eq!(h.store.write_count("info.system.dosageControl"), 1);
    assert_eq!(
        h.store.value("info.system.isChlorineDosageEnabled"),
        Some(ScalarValue::Bool(true))
    );
    assert_eq!(
        h.store.value("info.system.isPhPlusDosageEnabled"),
        Some(ScalarValue::Bool(false))
    );

    let value = h.store.object("temperatures.0.value").unwrap();
    assert_eq!(value.common.role, Some(Role::Temperature));
    assert_eq!(value.common.unit.as_deref(), Some("°C"));
}

#[tokio::test]
async fn unchanged_poll_writes_nothing() {
    let mut h = harness(vec![pump(), pool_temperature()]).await;
    h.cycle().await;
    let before = h.store.total_writes();

    h.cycle().await;
    assert_eq!(h.store.total_writes(), before);
}

#[tokio::test]
async fn changed_field_is_the_only_write() {
    let mut h = harness(vec![pump(), pool_temperature()]).await;
    h.cycle().await;

    h.device
        .modify(|s| {
            let t = s.objects.iter_mut().find(|o| o.id == 40).unwrap();
            t.value = 25.0;
        })
        .await;
    h.cycle().await;

    assert_eq!(h.store.write_count("temperatures.0.value"), 2);
    assert_eq!(h.store.write_count("temperatures.0.displayValue"), 1);
    assert_eq!(h.store.write_count("relays.1.value"), 1);
    assert_eq!(h.store.value("temperatures.0.value"), Some(ScalarValue::Number(25.0)));
}

#[tokio::test]
async fn auto_intent_forces_next_update() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;
    let before = h.store.write_count("relays.1.value");

    let outcome = h
        .engine
        .dispatch(&Intent::SetAuto {
            channel: "relays.1".into(),
            want: true,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Sent { id: 1, .. }));
    assert_eq!(
        h.device.calls().await,
        vec![DeviceCall::Relay {
            channel: 1,
            command: RelayCommand::Auto
        }]
    );
    assert_eq!(h.engine.ledger().ids(), vec![1]);

    // The relay was already in auto mode, so the device value is identical.
    h.cycle().await;
    assert_eq!(h.store.write_count("relays.1.value"), before + 1);
    assert!(h.engine.ledger().is_empty());

    h.cycle().await;
    assert_eq!(h.store.write_count("relays.1.value"), before + 1);
}

#[tokio::test]
async fn lost_confirmation_is_still_force_updated() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;
    h.device.set_write_failure(WriteFailure::LostConfirmation).await;

    let outcome = h
        .engine
        .dispatch(&Intent::SetOnOff {
            channel: "relays.1".into(),
            want: true,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::TransportFailed { id: 1, .. }));
    assert!(h.engine.ledger().contains(1));

    h.cycle().await;
    // on + manual
    assert_eq!(h.store.value("relays.1.value"), Some(ScalarValue::Number(3.0)));
    assert_eq!(h.store.value("relays.1.onOff"), Some(ScalarValue::Bool(true)));
    assert_eq!(h.store.value("relays.1.auto"), Some(ScalarValue::Bool(false)));
}

#[tokio::test]
async fn label_change_renames_without_recreating() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;
    let objects = h.store.object_count();

    h.device
        .modify(|s| s.objects[0].label = "Filter pump".into())
        .await;
    h.cycle().await;

    assert_eq!(h.store.object_count(), objects);
    assert_eq!(h.store.object("relays.1").unwrap().common.name, "Filter pump");
    assert_eq!(
        h.store.object("relays.1.value").unwrap().common.name,
        "Filter pump value"
    );
    assert_eq!(
        h.store.object("relays.1.auto").unwrap().common.name,
        "Filter pump auto"
    );
    assert_eq!(h.store.write_count("relays.1.label"), 2);
    assert_eq!(h.store.write_count("relays.1.value"), 1);
}

#[tokio::test]
async fn new_object_after_bootstrap_is_created_and_written() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;

    h.device.modify(|s| s.objects.push(pool_temperature())).await;
    h.cycle().await;

    assert!(h.store.contains("temperatures.0"));
    assert_eq!(h.store.value("temperatures.0.value"), Some(ScalarValue::Number(24.5)));
}

#[tokio::test]
async fn poll_failure_clears_connection_flag() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;
    let status = h.engine.status();

    h.device.set_offline(true).await;
    let err = poolbridge_api::DeviceApi::poll(h.device.as_ref())
        .await
        .unwrap_err();
    h.engine.handle_poll_error(&err).await;
    h.engine.handle_poll_error(&err).await;

    assert_eq!(h.store.value("info.connection"), Some(ScalarValue::Bool(false)));
    assert_eq!(
        status.borrow().connection,
        ConnectionState::Unreachable { failures: 2 }
    );

    h.device.set_offline(false).await;
    h.cycle().await;
    assert_eq!(h.store.value("info.connection"), Some(ScalarValue::Bool(true)));
    assert_eq!(status.borrow().connection, ConnectionState::Connected);
}

#[tokio::test]
async fn acknowledged_changes_are_not_intents() {
    let mut h = harness(vec![pump()]).await;
    h.cycle().await;

    let echo = poolbridge_core::StateChange {
        path: "relays.1.onOff".into(),
        value: true.into(),
        ack: true,
    };
    assert_eq!(h.engine.handle_state_change(&echo).await, None);

    let unknown = poolbridge_core::StateChange {
        path: "relays.9.onOff".into(),
        value: true.into(),
        ack: false,
    };
    assert_eq!(h.engine.handle_state_change(&unknown).await, None);
    assert!(h.device.calls().await.is_empty());
}

#[tokio::test]
async fn queued_intent_survives_a_large_write_batch() {
    let sensors = (0..200).map(|n| DataObject {
        id: 1000 + n,
        category: Category::Analog,
        category_id: n,
        label: format!("Sensor {n}"),
        value: 1.0,
        display_value: "1.0".into(),
        unit: String::new(),
        active: true,
    });
    let mut h = harness(std::iter::once(pump()).chain(sensors).collect()).await;
    h.cycle().await;

    let mut intents = h.store.subscribe_intents();
    h.store
        .set_state("relays.1.auto", false.into(), false)
        .await
        .unwrap();
    let before = h.store.total_writes();
    h.device
        .modify(|s| {
            for o in s.objects.iter_mut().filter(|o| o.category == Category::Analog) {
                o.value = 2.0;
                o.display_value = "2.0".into();
            }
        })
        .await;
    h.cycle().await;
    // More acknowledged writes than the change broadcast holds.
    assert!(h.store.total_writes() - before > 256);

    let intent = intents.try_recv().unwrap();
    assert_eq!(intent.path, "relays.1.auto");
    assert!(intents.try_recv().is_err());

    let outcome = h.engine.handle_state_change(&intent).await;
    assert!(matches!(outcome, Some(DispatchOutcome::Sent { id: 1, .. })));
}

#[tokio::test]
async fn enabling_external_bank_writes_new_relay_entries() {
    let garden = DataObject {
        id: 100,
        category: Category::ExternalRelays,
        category_id: 0,
        label: "Fountain".into(),
        // on + manual
        value: 3.0,
        display_value: "on (manual)".into(),
        unit: String::new(),
        active: true,
    };
    let mut h = harness(vec![pump(), garden]).await;
    h.cycle().await;
    assert!(!h.store.contains("externalRelays.0.onOff"));

    h.device
        .modify(|s| s.sys_info.insert(sys_keys::CONFIG_OTHER_ENABLE, 0x4_u32))
        .await;
    h.cycle().await;

    assert_eq!(h.store.value("externalRelays.0.onOff"), Some(ScalarValue::Bool(true)));
    assert_eq!(h.store.value("externalRelays.0.auto"), Some(ScalarValue::Bool(false)));

    let outcome = h
        .engine
        .dispatch(&Intent::SetAuto {
            channel: "externalRelays.0".into(),
            want: false,
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            id: 100,
            command: DeviceCommand::Relay(RelayCommand::On)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_dispatches_platform_writes() {
    let h = harness(vec![pump()]).await;
    let Harness {
        device,
        store,
        engine,
    } = h;

    let mut status = engine.status();
    let cancel = engine.cancel_token();
    let (poller, polls) = engine.spawn_poller();
    let intents = store.subscribe_intents();
    let task = tokio::spawn(engine.run(polls, intents));

    status.wait_for(|s| s.cycles >= 1).await.unwrap();
    store
        .set_state("relays.1.onOff", true.into(), false)
        .await
        .unwrap();
    status.wait_for(|s| s.cycles >= 3).await.unwrap();

    cancel.cancel();
    let report = task.await.unwrap();
    poller.join().await;

    assert_eq!(
        device.calls().await,
        vec![DeviceCall::Relay {
            channel: 1,
            command: RelayCommand::On
        }]
    );
    assert_eq!(report.failed, 0);
    assert_eq!(store.value("relays.1.onOff"), Some(ScalarValue::Bool(true)));
    assert_eq!(store.value("info.connection"), Some(ScalarValue::Bool(false)));
    assert_eq!(status.borrow().connection, ConnectionState::Disconnected);
}
