//! FSM unit tests

use deploymark::deploy::fsm::{ControlLoopEvent, ControlLoopFsm, ControlLoopState};

#[test]
fn test_fsm_initial_state() {
    let fsm = ControlLoopFsm::new();
    assert_eq!(fsm.state(), ControlLoopState::MarkForDeployment);
    assert!(fsm.reason().is_none());
}

#[test]
fn test_fsm_deploy_success_flow() {
    let mut fsm = ControlLoopFsm::new();

    fsm.process(ControlLoopEvent::MarkSucceeded).unwrap();
    assert_eq!(fsm.state(), ControlLoopState::Deploying);

    fsm.process(ControlLoopEvent::DeployFinished).unwrap();
    assert_eq!(fsm.state(), ControlLoopState::Deployed);
}

#[test]
fn test_fsm_rollback_flow() {
    let mut fsm = ControlLoopFsm::new();

    fsm.process(ControlLoopEvent::MarkSucceeded).unwrap();
    fsm.process(ControlLoopEvent::RollbackStarted("cancelled".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), ControlLoopState::StartRollback);
    assert_eq!(fsm.reason(), Some("cancelled"));
}

#[test]
fn test_fsm_abort_flow() {
    let mut fsm = ControlLoopFsm::new();

    fsm.process(ControlLoopEvent::MarkSucceeded).unwrap();
    fsm.process(ControlLoopEvent::DeployAborted("timed out".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), ControlLoopState::DeployAborted);
    assert_eq!(fsm.reason(), Some("timed out"));
}

#[test]
fn test_fsm_terminal_states_reject_events() {
    let mut fsm = ControlLoopFsm::new();
    fsm.process(ControlLoopEvent::MarkFailed).unwrap();
    assert_eq!(fsm.state(), ControlLoopState::MfdFailed);

    assert!(fsm.process(ControlLoopEvent::MarkSucceeded).is_err());
    assert!(fsm.process(ControlLoopEvent::DeployFinished).is_err());
    assert_eq!(fsm.state(), ControlLoopState::MfdFailed);
}

#[test]
fn test_fsm_cannot_finish_before_marking() {
    let mut fsm = ControlLoopFsm::new();
    let result = fsm.process(ControlLoopEvent::DeployFinished);
    assert!(result.is_err());
    assert_eq!(fsm.state(), ControlLoopState::MarkForDeployment);
}

#[test]
fn test_state_names() {
    assert_eq!(ControlLoopState::MfdFailed.to_string(), "mfd_failed");
    assert_eq!(ControlLoopState::StartRollback.as_str(), "start_rollback");
    assert_eq!(
        serde_json::to_string(&ControlLoopState::DeployAborted).unwrap(),
        "\"deploy_aborted\""
    );
}
