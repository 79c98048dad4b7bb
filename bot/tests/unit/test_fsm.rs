//! FSM unit tests

use deploybot::deploy::fsm::{SyncEvent, SyncFsm, SyncState};

#[test]
fn test_fsm_initial_state() {
    let fsm = SyncFsm::new();
    assert_eq!(fsm.state(), SyncState::Idle);
    assert!(fsm.error().is_none());
    assert!(!fsm.state().is_terminal());
}

#[test]
fn test_fsm_sync_success_flow() {
    let mut fsm = SyncFsm::new();

    // Idle -> Triggering
    fsm.process(SyncEvent::Trigger).unwrap();
    assert_eq!(fsm.state(), SyncState::Triggering);

    // Triggering -> Polling
    fsm.process(SyncEvent::Triggered).unwrap();
    assert_eq!(fsm.state(), SyncState::Polling);

    // Polling -> Completed
    fsm.process(SyncEvent::Synced).unwrap();
    assert_eq!(fsm.state(), SyncState::Completed);
}

#[test]
fn test_fsm_trigger_failure_flow() {
    let mut fsm = SyncFsm::new();

    fsm.process(SyncEvent::Trigger).unwrap();
    fsm.process(SyncEvent::TriggerFailed("test error".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), SyncState::Failed);
    assert_eq!(fsm.error(), Some("test error"));
}

#[test]
fn test_fsm_stall() {
    let mut fsm = SyncFsm::new();
    fsm.process(SyncEvent::Trigger).unwrap();
    fsm.process(SyncEvent::Triggered).unwrap();

    fsm.process(SyncEvent::RoundLimit).unwrap();
    assert_eq!(fsm.state(), SyncState::Stalled);
    assert!(fsm.state().is_terminal());
}

#[test]
fn test_fsm_cancel_while_polling() {
    let mut fsm = SyncFsm::new();
    fsm.process(SyncEvent::Trigger).unwrap();
    fsm.process(SyncEvent::Triggered).unwrap();

    fsm.process(SyncEvent::Cancel).unwrap();
    assert_eq!(fsm.state(), SyncState::Cancelled);
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = SyncFsm::new();

    // Cannot report a sync before triggering
    let result = fsm.process(SyncEvent::Synced);
    assert!(result.is_err());
    assert_eq!(fsm.state(), SyncState::Idle);

    // Cannot trigger twice
    fsm.process(SyncEvent::Trigger).unwrap();
    assert!(fsm.process(SyncEvent::Trigger).is_err());
    assert!(fsm.process(SyncEvent::RoundLimit).is_err());
}

#[test]
fn test_fsm_terminal_states_reject_events() {
    let mut fsm = SyncFsm::new();
    fsm.process(SyncEvent::Trigger).unwrap();
    fsm.process(SyncEvent::Triggered).unwrap();
    fsm.process(SyncEvent::Synced).unwrap();

    for event in [
        SyncEvent::Trigger,
        SyncEvent::Triggered,
        SyncEvent::Synced,
        SyncEvent::RoundLimit,
        SyncEvent::Cancel,
    ] {
        assert!(fsm.process(event).is_err());
    }
    assert_eq!(fsm.state(), SyncState::Completed);
}

#[test]
fn test_sync_state_serialization() {
    assert_eq!(
        serde_json::to_string(&SyncState::Stalled).unwrap(),
        "\"stalled\""
    );
}
