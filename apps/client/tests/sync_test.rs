//! Client synchronizer against a live controller

mod common;

use common::{drive_until, TestController};
use thermo_client::{Intent, SyncState};
use thermo_protocol::{Mode, OperatingState};

#[tokio::test]
async fn test_initial_sync_renders_controller_state() {
    let controller = TestController::spawn().await;
    let (mut channel, mut sync, cancel) = controller.client();

    drive_until(&mut channel, &mut sync, |s| s.state() == SyncState::Synced).await;

    let display = sync.render();
    assert_eq!(display.status, "System disabled");
    assert!(!display.enabled);

    cancel.cancel();
}

#[tokio::test]
async fn test_intent_round_trips_through_controller() {
    let controller = TestController::spawn().await;
    let (mut channel, mut sync, cancel) = controller.client();
    drive_until(&mut channel, &mut sync, |s| s.state() == SyncState::Synced).await;

    sync.dispatch_intent(Intent::Enable, &channel);
    // mirror only changes once the controller broadcasts
    assert_eq!(sync.mirror().map(|m| m.enabled), Some(false));

    drive_until(&mut channel, &mut sync, |s| {
        s.mirror().map(|m| m.enabled) == Some(true)
    })
    .await;
    assert!(sync.render().enabled);
    assert!(controller.sync.snapshot().enabled);

    // no control loop here, so the state has not followed yet
    assert_eq!(
        sync.mirror().map(|m| m.operating_state),
        Some(OperatingState::Disabled)
    );

    cancel.cancel();
}

#[tokio::test]
async fn test_rejected_intent_leaves_mirror_alone() {
    let controller = TestController::spawn().await;
    let (mut channel, mut sync, cancel) = controller.client();
    drive_until(&mut channel, &mut sync, |s| s.state() == SyncState::Synced).await;
    let before = sync.mirror().cloned();

    sync.dispatch_intent(Intent::SetTemperature(150.0), &channel);
    sync.dispatch_intent(Intent::SetMode(Mode::Heat), &channel);

    // the valid command after it is applied, the rejected one never was
    drive_until(&mut channel, &mut sync, |s| {
        s.mirror().map(|m| m.mode) == Some(Mode::Heat)
    })
    .await;

    let after = sync.mirror().cloned();
    assert_eq!(
        after.as_ref().map(|m| m.desired_temperature),
        before.as_ref().map(|m| m.desired_temperature)
    );
    assert_eq!(controller.sync.snapshot().desired_temperature, 75.0);

    cancel.cancel();
}

#[tokio::test]
async fn test_heartbeats_keep_mirror_current() {
    let controller = TestController::spawn().await;
    let (mut channel, mut sync, cancel) = controller.client();
    drive_until(&mut channel, &mut sync, |s| s.state() == SyncState::Synced).await;

    // readings are not broadcast on their own; the next heartbeat carries them
    controller.sync.record_reading(66.4, 51.0);
    drive_until(&mut channel, &mut sync, |s| {
        s.mirror().map(|m| m.current_temperature) == Some(66.4)
    })
    .await;

    let display = sync.render();
    assert_eq!(display.temperature, "66.4°");
    assert_eq!(display.humidity, "51%");
    assert_eq!(sync.state(), SyncState::Synced);
    cancel.cancel();
}
