//! End-to-end lifecycle scenarios driving real children through the
//! supervisor: happy run, startup failure with bounded retries, expected
//! exits, graceful stop, and the SIGKILL fallback.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use taskmaster::{IniConfigSource, InstanceStatus, ProcessState, Supervisor};

fn write_config(dir: &tempfile::TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("taskmaster.conf");
    std::fs::write(&path, text).unwrap();
    path
}

fn supervisor(path: &Path) -> Supervisor {
    Supervisor::new(IniConfigSource::new(path), Vec::new()).unwrap()
}

fn wait_for(sup: &Supervisor, timeout: Duration, pred: impl Fn(&[InstanceStatus]) -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred(&sup.snapshot()) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    false
}

fn instance<'a>(snapshot: &'a [InstanceStatus], name: &str) -> &'a InstanceStatus {
    snapshot
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("instance {name} missing from snapshot"))
}

/// A pid is held exactly while the state says one should be.
fn assert_pid_state_coupling(snapshot: &[InstanceStatus]) {
    for status in snapshot {
        let should_hold_pid = matches!(
            status.state,
            ProcessState::Running | ProcessState::Starting | ProcessState::Stopping
        );
        assert_eq!(
            status.pid.is_some(),
            should_hold_pid,
            "{}: pid presence disagrees with state {}",
            status.name,
            status.state
        );
    }
}

#[test]
fn happy_run_reports_running_with_pid_and_uptime() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:echo]\ncommand=/bin/sleep 60\nautostart=true\nnumprocs=1\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();
    sup.spawn_monitor();

    std::thread::sleep(Duration::from_secs(2));
    let snapshot = sup.snapshot();
    let echo = instance(&snapshot, "echo");
    assert_eq!(echo.state, ProcessState::Running);
    assert!(echo.pid.is_some());
    assert!(echo.uptime >= Duration::from_secs(1));
    assert_pid_state_coupling(&snapshot);

    let report = sup.status(None);
    assert!(report.contains("echo: RUNNING (PID: "), "report: {report}");
    assert!(report.contains("Uptime: "), "report: {report}");

    sup.shutdown();
    let echo_after = sup.snapshot();
    assert_eq!(instance(&echo_after, "echo").state, ProcessState::Stopped);
    assert_pid_state_coupling(&echo_after);
}

#[test]
fn startup_failure_backs_off_then_goes_fatal_after_retries() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:flaky]\ncommand=/bin/false\nstarttime=5\nstartretries=2\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();
    sup.spawn_monitor();

    assert!(
        wait_for(&sup, Duration::from_secs(20), |snap| {
            instance(snap, "flaky").state == ProcessState::Fatal
        }),
        "instance never reached FATAL"
    );
    let snapshot = sup.snapshot();
    let flaky = instance(&snapshot, "flaky");
    // Exactly two automatic restart attempts were made.
    assert_eq!(flaky.restart_count, 2);
    assert_pid_state_coupling(&snapshot);

    // FATAL is terminal: nothing restarts it behind the user's back.
    std::thread::sleep(Duration::from_secs(3));
    assert_eq!(instance(&sup.snapshot(), "flaky").state, ProcessState::Fatal);
    assert_eq!(instance(&sup.snapshot(), "flaky").restart_count, 2);

    sup.shutdown();
}

#[test]
fn explicit_restart_resets_the_retry_counter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:flaky]\ncommand=/bin/false\nstarttime=5\nstartretries=1\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();
    sup.spawn_monitor();

    assert!(wait_for(&sup, Duration::from_secs(15), |snap| {
        instance(snap, "flaky").state == ProcessState::Fatal
    }));

    // Park the monitor so the freshly restarted child is observed before
    // any automatic policy kicks back in.
    sup.shutdown();

    assert!(sup.restart("flaky"));
    let snapshot = sup.snapshot();
    let flaky = instance(&snapshot, "flaky");
    assert_eq!(flaky.restart_count, 0);
    assert_eq!(flaky.state, ProcessState::Running);
    assert!(flaky.last_restart.is_some());
}

#[test]
fn expected_exit_parks_in_stopped_without_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:oneshot]\ncommand=/bin/true\nstarttime=0\nautorestart=unexpected\nexitcodes=0\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();
    sup.spawn_monitor();

    assert!(
        wait_for(&sup, Duration::from_secs(10), |snap| {
            instance(snap, "oneshot").state == ProcessState::Stopped
        }),
        "expected exit should settle in STOPPED"
    );
    let snapshot = sup.snapshot();
    let oneshot = instance(&snapshot, "oneshot");
    assert_eq!(oneshot.restart_count, 0);
    assert_eq!(oneshot.last_exit_status, 0);
    assert_pid_state_coupling(&snapshot);

    sup.shutdown();
}

#[test]
fn unexpected_exit_is_restarted_under_unexpected_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:crasher]\ncommand=/bin/sh -c \"exit 1\"\nstarttime=0\nautorestart=unexpected\nexitcodes=0\nstartretries=1\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();
    sup.spawn_monitor();

    // Exit code 1 is not expected, so the monitor retries until the budget
    // is spent and the instance lands in FATAL with one attempt made.
    assert!(wait_for(&sup, Duration::from_secs(15), |snap| {
        instance(snap, "crasher").state == ProcessState::Fatal
    }));
    assert_eq!(instance(&sup.snapshot(), "crasher").restart_count, 1);

    sup.shutdown();
}

#[test]
fn graceful_stop_is_honored_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:polite]\ncommand=/bin/sh -c \"trap 'exit 0' TERM; while true; do sleep 0.2; done\"\nstopsignal=TERM\nstoptime=5\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();

    std::thread::sleep(Duration::from_millis(500));
    let started = Instant::now();
    assert!(sup.stop("polite"));
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(3), "stop took {elapsed:?}");

    let snapshot = sup.snapshot();
    assert_eq!(instance(&snapshot, "polite").state, ProcessState::Stopped);
    assert_pid_state_coupling(&snapshot);
}

#[test]
fn stubborn_child_is_sigkilled_after_stop_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:stubborn]\ncommand=/bin/sh -c \"trap '' TERM; while true; do sleep 0.2; done\"\nstopsignal=TERM\nstoptime=2\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();

    std::thread::sleep(Duration::from_millis(500));
    let started = Instant::now();
    assert!(sup.stop("stubborn"));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "stop returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "stop took {elapsed:?}");

    assert_eq!(
        instance(&sup.snapshot(), "stubborn").state,
        ProcessState::Stopped
    );
}

#[test]
fn numprocs_expands_into_indexed_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:pool]\ncommand=/bin/sleep 60\nnumprocs=3\nautostart=true\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();

    let snapshot = sup.snapshot();
    let names: Vec<&str> = snapshot.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["pool_0", "pool_1", "pool_2"]);

    let pids: std::collections::BTreeSet<i32> =
        snapshot.iter().filter_map(|s| s.pid).collect();
    assert_eq!(pids.len(), 3, "instances must not share a pid");

    sup.shutdown();
    // Drop also reaps: a second shutdown is a no-op.
    sup.shutdown();
}

#[test]
fn autostart_false_stays_stopped_until_started() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:lazy]\ncommand=/bin/sleep 60\nautostart=false\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();

    assert_eq!(instance(&sup.snapshot(), "lazy").state, ProcessState::Stopped);
    assert!(sup.start("lazy"));
    assert_eq!(instance(&sup.snapshot(), "lazy").state, ProcessState::Running);
    assert!(sup.stop("lazy"));
}
