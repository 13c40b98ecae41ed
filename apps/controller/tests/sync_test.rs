//! End-to-end sync tests over a live WebSocket

mod common;

use std::time::Duration;

use common::{
    assert_silent, fast_config, next_event, next_frame, quiet_config, send_frame, send_raw,
    TestController,
};
use rstest::rstest;
use serde_json::json;
use thermo_protocol::{
    events, Command, ConnectedPayload, Envelope, Mode, OperatingState, ServerEvent,
    ThermostatSnapshot,
};

const NS: &str = "/thermostat";

fn snapshot_of(frame: &Envelope) -> ThermostatSnapshot {
    match ServerEvent::from_envelope(frame).unwrap() {
        ServerEvent::Connected(ConnectedPayload::Snapshot(snapshot))
        | ServerEvent::StatusHeartbeat(snapshot) => snapshot,
        other => panic!("expected a snapshot, got {:?}", other),
    }
}

#[test_log::test(tokio::test)]
async fn test_connected_carries_full_snapshot_first() {
    let controller = TestController::spawn(fast_config()).await;
    let mut ws = controller.connect().await;

    let first = next_frame(&mut ws).await;
    assert_eq!(first.event, events::CONNECTED);
    assert_eq!(first.ns, NS);
    assert_eq!(snapshot_of(&first), controller.sync.snapshot());
}

#[tokio::test]
async fn test_heartbeat_reaches_every_client() {
    let controller = TestController::spawn(fast_config()).await;
    let mut a = controller.connect().await;
    let mut b = controller.connect().await;

    for ws in [&mut a, &mut b] {
        next_event(ws, events::CONNECTED).await;
        let tick = next_event(ws, events::TEMP_HEARTBEAT).await;
        assert!(tick.data["temp"].is_number());
        let heartbeat = next_event(ws, events::STATUS_HEARTBEAT).await;
        assert_eq!(snapshot_of(&heartbeat).desired_temperature, 75.0);
    }
}

#[rstest]
#[case(Command::SetEnabled(true), "enabled")]
#[case(Command::SetDesiredTemperature(70.0), "desired_temperature")]
#[case(Command::SetMode(Mode::Heat), "mode")]
#[tokio::test]
async fn test_valid_command_mutates_exactly_one_field(
    #[case] command: Command,
    #[case] field: &str,
) {
    let controller = TestController::spawn(quiet_config()).await;
    let mut ws = controller.connect().await;
    let before = snapshot_of(&next_frame(&mut ws).await);

    send_frame(&mut ws, &command.to_envelope(NS)).await;

    let after = snapshot_of(&next_event(&mut ws, events::STATUS_HEARTBEAT).await);
    assert_eq!(before.changed_fields(&after), vec![field]);
}

#[tokio::test]
async fn test_out_of_range_temperature_is_rejected_silently() {
    let controller = TestController::spawn(quiet_config()).await;
    let mut ws = controller.connect().await;
    next_frame(&mut ws).await;
    let before = controller.sync.snapshot();

    send_frame(&mut ws, &Command::SetDesiredTemperature(150.0).to_envelope(NS)).await;

    assert_silent(&mut ws, Duration::from_millis(300)).await;
    assert_eq!(controller.sync.snapshot(), before);
}

#[tokio::test]
async fn test_garbage_and_foreign_frames_are_ignored() {
    let controller = TestController::spawn(quiet_config()).await;
    let mut ws = controller.connect().await;
    next_frame(&mut ws).await;
    let before = controller.sync.snapshot();

    send_raw(&mut ws, "not json at all").await;
    send_frame(&mut ws, &Envelope::new(NS, "set_mode", json!(9))).await;
    send_frame(&mut ws, &Envelope::new(NS, "reboot", json!(null))).await;
    send_frame(&mut ws, &Command::SetMode(Mode::Cool).to_envelope("/chat")).await;

    assert_silent(&mut ws, Duration::from_millis(300)).await;
    assert_eq!(controller.sync.snapshot(), before);

    // the connection survives bad input
    send_frame(&mut ws, &Command::SetMode(Mode::Cool).to_envelope(NS)).await;
    let after = snapshot_of(&next_event(&mut ws, events::STATUS_HEARTBEAT).await);
    assert_eq!(after.mode, Mode::Cool);
}

#[tokio::test]
async fn test_commands_apply_in_arrival_order() {
    let controller = TestController::spawn(quiet_config()).await;
    let mut ws = controller.connect().await;
    next_frame(&mut ws).await;

    for temperature in [60.0, 65.0, 70.0] {
        send_frame(&mut ws, &Command::SetDesiredTemperature(temperature).to_envelope(NS)).await;
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        let frame = next_event(&mut ws, events::STATUS_HEARTBEAT).await;
        seen.push(snapshot_of(&frame).desired_temperature);
    }
    assert_eq!(seen, vec![60.0, 65.0, 70.0]);
    assert_eq!(controller.sync.snapshot().desired_temperature, 70.0);
}

#[tokio::test]
async fn test_command_from_one_client_reaches_the_other() {
    let controller = TestController::spawn(quiet_config()).await;
    let mut sender = controller.connect().await;
    let mut watcher = controller.connect().await;
    next_frame(&mut sender).await;
    next_frame(&mut watcher).await;

    send_frame(&mut sender, &Command::SetEnabled(true).to_envelope(NS)).await;

    let seen = snapshot_of(&next_event(&mut watcher, events::STATUS_HEARTBEAT).await);
    assert!(seen.enabled);
}

#[tokio::test]
async fn test_operating_state_change_is_broadcast_immediately() {
    let controller = TestController::spawn(quiet_config()).await;
    let mut ws = controller.connect().await;
    next_frame(&mut ws).await;

    controller
        .sync
        .apply_command(Command::SetEnabled(true))
        .unwrap();
    next_event(&mut ws, events::STATUS_HEARTBEAT).await;

    controller
        .sync
        .update_operating_state(OperatingState::Heating, Some(12.0))
        .unwrap();
    let snapshot = snapshot_of(&next_event(&mut ws, events::STATUS_HEARTBEAT).await);
    assert_eq!(snapshot.operating_state, OperatingState::Heating);
    assert_eq!(snapshot.time_to_target_minutes, Some(12.0));
}

#[tokio::test]
async fn test_disconnect_unregisters_client() {
    let controller = TestController::spawn(quiet_config()).await;
    let mut ws = controller.connect().await;
    next_frame(&mut ws).await;
    assert_eq!(controller.sync.connections().connection_count(), 1);

    ws.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.sync.connections().connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("connection was not removed");
}
