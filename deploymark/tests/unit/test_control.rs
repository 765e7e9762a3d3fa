//! Control loop unit tests

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use deploymark::deploy::control::{CancelSignal, DeploymentControlLoop};
use deploymark::deploy::fsm::ControlLoopState;
use deploymark::deploy::ExitStatus;
use deploymark::errors::WaitError;
use tokio_test::assert_ok;

use crate::common::*;

fn never() -> CancelSignal {
    Box::pin(pending::<()>())
}

fn control_loop(harness: &Harness, block: bool, auto_rollback: bool) -> DeploymentControlLoop {
    DeploymentControlLoop::new(
        params(block, auto_rollback),
        deploy_info(notifying_step()),
        harness.deps(),
    )
}

#[tokio::test]
async fn test_non_blocking_run_stops_after_mark() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Ok(())),
        FakeDeployedSha::new(None),
    );
    let mut cl = control_loop(&harness, false, false);

    assert_eq!(cl.state(), ControlLoopState::MarkForDeployment);
    assert_eq!(cl.run(never()).await, ExitStatus::Success);
    assert_eq!(cl.state(), ControlLoopState::Deploying);
    assert_eq!(harness.waiter.calls(), 0);
    assert_eq!(harness.marker.marked(), vec![NEW_SHA.to_string()]);
}

#[tokio::test]
async fn test_failed_mark_never_waits() {
    let harness = Harness::new(
        FakeMarker::with_results(&[ExitStatus::Failure]),
        FakeWaiter::returning(Ok(())),
        FakeDeployedSha::new(None),
    );
    let mut cl = control_loop(&harness, true, true);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::MfdFailed);
    assert_eq!(harness.waiter.calls(), 0);
    // one "mark failed" message
    assert_eq!(harness.poster.count(), 1);
}

#[tokio::test]
async fn test_converged_deploy() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Ok(())),
        FakeDeployedSha::new(None),
    );
    let mut cl = control_loop(&harness, true, true);

    assert_eq!(cl.run(never()).await, ExitStatus::Success);
    assert_eq!(cl.state(), ControlLoopState::Deployed);
    assert_eq!(harness.waiter.calls(), 1);
    assert_eq!(harness.marker.marked().len(), 1);

    let texts = harness.poster.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Finished deployment"));
}

#[tokio::test]
async fn test_generic_failure_aborts_without_rollback() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Failed("status api gone".to_string()))),
        FakeDeployedSha::new(Some(OLD_SHA)),
    );
    let mut cl = control_loop(&harness, true, true);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::DeployAborted);
    assert_eq!(harness.marker.marked().len(), 1);
    assert_eq!(harness.deployed.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_wait_rolls_back() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Cancelled)),
        FakeDeployedSha::new(None),
    );
    let mut cl = control_loop(&harness, true, true);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::StartRollback);
    assert_eq!(harness.waiter.calls(), 1);
    assert_eq!(
        harness.marker.marked(),
        vec![NEW_SHA.to_string(), OLD_SHA.to_string()]
    );
    assert!(harness.poster.texts().last().unwrap().contains("Rolled back"));
}

#[tokio::test]
async fn test_cancelled_wait_without_auto_rollback_aborts() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Cancelled)),
        FakeDeployedSha::new(None),
    );
    let mut cl = control_loop(&harness, true, false);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::DeployAborted);
    assert_eq!(harness.marker.marked().len(), 1);
}

#[tokio::test]
async fn test_timeout_already_on_commit_skips_rollback() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Timeout(Duration::from_secs(60)))),
        FakeDeployedSha::new(Some(NEW_SHA)),
    );
    let mut cl = control_loop(&harness, true, true);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::DeployAborted);
    assert_eq!(harness.marker.marked().len(), 1);
    assert_eq!(harness.deployed.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timeout_on_other_commit_rolls_back() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Timeout(Duration::from_secs(60)))),
        FakeDeployedSha::new(Some(OLD_SHA)),
    );
    let mut cl = control_loop(&harness, true, true);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::StartRollback);
    assert_eq!(
        harness.marker.marked(),
        vec![NEW_SHA.to_string(), OLD_SHA.to_string()]
    );
    assert!(cl.reason().unwrap().contains("did not converge"));
}

#[tokio::test]
async fn test_timeout_without_auto_rollback_aborts() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Timeout(Duration::from_secs(60)))),
        FakeDeployedSha::new(Some(OLD_SHA)),
    );
    let mut cl = control_loop(&harness, true, false);

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::DeployAborted);
    assert_eq!(harness.deployed.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_signal_interrupts_wait() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::hanging(),
        FakeDeployedSha::new(None),
    );
    let mut cl = control_loop(&harness, true, true);

    let cancel: CancelSignal = Box::pin(tokio::time::sleep(Duration::from_millis(20)));
    let ret = assert_ok!(tokio::time::timeout(Duration::from_secs(5), cl.run(cancel)).await);

    assert_eq!(ret, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::StartRollback);
    assert_eq!(harness.waiter.calls(), 1);
    assert_eq!(
        harness.marker.marked(),
        vec![NEW_SHA.to_string(), OLD_SHA.to_string()]
    );
}

#[tokio::test]
async fn test_cancel_without_previous_commit_still_starts_rollback() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Err(WaitError::Cancelled)),
        FakeDeployedSha::new(None),
    );
    let mut params = params(true, true);
    params.old_commit = None;
    let mut cl = DeploymentControlLoop::new(params, deploy_info(notifying_step()), harness.deps());

    assert_eq!(cl.run(never()).await, ExitStatus::Failure);
    assert_eq!(cl.state(), ControlLoopState::StartRollback);
    // nothing to restore, so only the original mark happened
    assert_eq!(harness.marker.marked(), vec![NEW_SHA.to_string()]);
    assert!(harness.poster.texts().last().unwrap().contains("Rolled back"));
}

#[tokio::test]
async fn test_chat_failures_do_not_change_the_result() {
    let harness = Harness::new(
        FakeMarker::default(),
        FakeWaiter::returning(Ok(())),
        FakeDeployedSha::new(None),
    );
    let poster = Arc::new(FailingPoster::default());
    let mut deps = harness.deps();
    deps.notifier.poster = poster.clone();
    let mut cl = DeploymentControlLoop::new(params(true, true), deploy_info(notifying_step()), deps);

    assert_eq!(cl.run(never()).await, ExitStatus::Success);
    assert_eq!(cl.state(), ControlLoopState::Deployed);
    // mark and good-deploy messages were both attempted
    assert_eq!(poster.calls.load(Ordering::SeqCst), 2);
}
