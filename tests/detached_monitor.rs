mod common;

use std::time::Duration;

use common::{
    TestResult, follow, init_tracing, process_alive, read_pidfile, sh, wait_for_exit, with_timeout,
};
use jobctl::exec::{OutcomeDescriptor, UnitOutcome, UnitState};
use jobctl::jobs::{JobRegistry, JobStatus};
use jobctl_test_utils::builders::ContextBuilder;
use jobctl_test_utils::fake_supervisor::FakeSupervisor;

const HANDOFF: &str = r#"echo "Running as unit: demo.service"; exit 0"#;

fn registry_with(supervisor: FakeSupervisor) -> JobRegistry {
    init_tracing();
    JobRegistry::new(ContextBuilder::new().supervisor(supervisor).build())
}

#[tokio::test]
async fn test_detached_unit_success() -> TestResult {
    let supervisor = FakeSupervisor::succeeding();
    let registry = registry_with(supervisor.clone());
    let id = registry.create_job(sh(HANDOFF));

    let (lines, ended) = with_timeout(follow(&registry, id)).await?;
    assert!(ended);
    assert_eq!(lines[0], "Running as unit: demo.service");
    assert_eq!(lines[1], "Monitoring detached unit demo.service...");

    let snap = registry.get_job(id).unwrap();
    assert_eq!(snap.status, JobStatus::Success);
    assert_eq!(snap.exit_code, Some(0));
    assert!(supervisor.queried_units().iter().all(|u| u == "demo.service"));
    assert!(supervisor.queried_units().len() >= 2);
    Ok(())
}

#[tokio::test]
async fn test_detached_unit_failure_uses_exec_status() -> TestResult {
    let registry = registry_with(FakeSupervisor::failing(100));
    let id = registry.create_job(sh(HANDOFF));

    let snap = with_timeout(registry.wait(id)).await?;
    assert_eq!(snap.status, JobStatus::Failed);
    assert_eq!(snap.exit_code, Some(100));
    Ok(())
}

#[tokio::test]
async fn test_unknown_outcome_with_marker_is_success() -> TestResult {
    let supervisor = FakeSupervisor::new(
        [UnitState::Failed],
        UnitOutcome::new(1, OutcomeDescriptor::Unknown),
    );
    let registry = registry_with(supervisor);
    let id = registry.create_job(sh(concat!(
        r#"echo "Running as unit: demo.service"; "#,
        r#"echo "System upgrade completed successfully."; exit 0"#,
    )));

    let snap = with_timeout(registry.wait(id)).await?;
    assert_eq!(snap.status, JobStatus::Success);
    assert_eq!(snap.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_unknown_outcome_without_marker_fails() -> TestResult {
    let supervisor = FakeSupervisor::new(
        [UnitState::Inactive],
        UnitOutcome::new(0, OutcomeDescriptor::Unknown),
    );
    let registry = registry_with(supervisor);
    let id = registry.create_job(sh(HANDOFF));

    let snap = with_timeout(registry.wait(id)).await?;
    assert_eq!(snap.status, JobStatus::Failed);
    assert_eq!(snap.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_unit_log_lines_arrive_before_end() -> TestResult {
    let supervisor = FakeSupervisor::new(
        [
            UnitState::Activating,
            UnitState::Active,
            UnitState::Active,
            UnitState::Active,
            UnitState::Inactive,
        ],
        UnitOutcome::new(0, OutcomeDescriptor::Success),
    )
    .with_tail(sh("echo tail-one; echo tail-two; exec sleep 60"));
    let registry = registry_with(supervisor);
    let id = registry.create_job(sh(HANDOFF));

    let (lines, ended) = with_timeout(follow(&registry, id)).await?;
    assert!(ended);
    let tail: Vec<&String> = lines.iter().filter(|l| l.starts_with("tail-")).collect();
    assert_eq!(tail, ["tail-one", "tail-two"]);

    // Nothing may be appended after the job is terminal.
    let record = registry.job(id).unwrap();
    let logs_at_end = record.logs();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(record.logs(), logs_at_end);
    assert_eq!(lines, logs_at_end);
    Ok(())
}

#[tokio::test]
async fn test_follower_that_cannot_start_does_not_block_verdict() -> TestResult {
    let supervisor =
        FakeSupervisor::succeeding().with_tail(vec!["/nonexistent/jobctl-missing-tail".into()]);
    let registry = registry_with(supervisor);
    let id = registry.create_job(sh(HANDOFF));

    let (lines, _) = with_timeout(follow(&registry, id)).await?;
    assert!(lines.iter().any(|l| l.starts_with("Unable to follow logs of demo.service")));
    let snap = registry.get_job(id).unwrap();
    assert_eq!(snap.status, JobStatus::Success);
    Ok(())
}

#[tokio::test]
async fn test_nonzero_exit_with_unit_line_is_not_monitored() -> TestResult {
    let supervisor = FakeSupervisor::succeeding();
    let registry = registry_with(supervisor.clone());
    let id = registry.create_job(sh(r#"echo "Running as unit: demo.service"; exit 3"#));

    let snap = with_timeout(registry.wait(id)).await?;
    assert_eq!(snap.status, JobStatus::Failed);
    assert_eq!(snap.exit_code, Some(3));
    assert!(supervisor.queried_units().is_empty());
    assert!(
        !registry
            .job(id)
            .unwrap()
            .logs()
            .iter()
            .any(|l| l.starts_with("Monitoring"))
    );
    Ok(())
}

#[tokio::test]
async fn test_last_unit_announcement_wins() -> TestResult {
    let supervisor = FakeSupervisor::succeeding();
    let registry = registry_with(supervisor.clone());
    let id = registry.create_job(sh(
        r#"echo "Running as unit: first.service"; echo "Running as unit: second.service"; exit 0"#,
    ));

    with_timeout(registry.wait(id)).await?;
    assert!(supervisor.queried_units().iter().all(|u| u == "second.service"));
    Ok(())
}

/// A unit that never settles, followed by a tail that records its pid.
fn never_settling(pidfile: &std::path::Path) -> FakeSupervisor {
    FakeSupervisor::new(
        [UnitState::Active],
        UnitOutcome::new(0, OutcomeDescriptor::Success),
    )
    .with_tail(sh(&format!("echo $$ > {}; exec sleep 30", pidfile.display())))
}

#[tokio::test]
async fn test_shutdown_stops_log_follower() -> TestResult {
    let dir = tempfile::tempdir()?;
    let pidfile = dir.path().join("tail.pid");
    let supervisor = never_settling(&pidfile);
    let registry = registry_with(supervisor.clone());
    let id = registry.create_job(sh(HANDOFF));

    let tail_pid = with_timeout(read_pidfile(&pidfile)).await;
    assert!(process_alive(tail_pid));

    with_timeout(registry.shutdown()).await;
    assert!(wait_for_exit(tail_pid, Duration::from_secs(5)), "log follower outlived shutdown");

    let snap = registry.get_job(id).unwrap();
    assert_eq!(snap.status, JobStatus::Failed);
    assert_eq!(snap.exit_code, Some(-1));
    Ok(())
}

#[test]
fn test_log_follower_does_not_outlive_runtime() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let pidfile = dir.path().join("tail.pid");
    let registry = JobRegistry::new(
        ContextBuilder::new()
            .supervisor(never_settling(&pidfile))
            .build(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let tail_pid = runtime.block_on(async {
        registry.create_job(sh(HANDOFF));
        with_timeout(read_pidfile(&pidfile)).await
    });
    assert!(process_alive(tail_pid));

    drop(runtime);
    assert!(wait_for_exit(tail_pid, Duration::from_secs(5)), "log follower outlived runtime");
    Ok(())
}
