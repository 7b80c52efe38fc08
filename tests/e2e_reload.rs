//! End-to-end hot-reload scenarios: idempotence, minimality, selective
//! replacement, additions, and removals against live children.

use std::path::{Path, PathBuf};
use std::time::Duration;

use taskmaster::{IniConfigSource, InstanceStatus, ProcessState, Supervisor};

fn write_config(dir: &tempfile::TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("taskmaster.conf");
    std::fs::write(&path, text).unwrap();
    path
}

fn supervisor(path: &Path) -> Supervisor {
    Supervisor::new(IniConfigSource::new(path), Vec::new()).unwrap()
}

fn instance<'a>(snapshot: &'a [InstanceStatus], name: &str) -> &'a InstanceStatus {
    snapshot
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("instance {name} missing from snapshot"))
}

const TWO_PROGRAMS: &str = "[program:a]\ncommand=/bin/sleep 60\nautostart=true\n\n\
                            [program:b]\ncommand=/bin/sleep 60\nautostart=true\n";

#[test]
fn byte_identical_reload_preserves_pids_and_uptime() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, TWO_PROGRAMS);
    let sup = supervisor(&path);
    sup.start_autostart();

    std::thread::sleep(Duration::from_secs(1));
    let before = sup.snapshot();

    assert!(sup.reload());

    let after = sup.snapshot();
    for name in ["a", "b"] {
        let pre = instance(&before, name);
        let post = instance(&after, name);
        assert_eq!(post.state, ProcessState::Running);
        assert_eq!(post.pid, pre.pid, "{name}: pid must survive an identical reload");
        assert!(
            post.uptime >= pre.uptime,
            "{name}: uptime must keep counting from the original spawn"
        );
        assert_eq!(post.restart_count, pre.restart_count);
    }
}

#[test]
fn priority_only_change_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[program:a]\ncommand=/bin/sleep 60\npriority=999\n");
    let sup = supervisor(&path);
    sup.start_autostart();

    let before = sup.snapshot();
    write_config(&dir, "[program:a]\ncommand=/bin/sleep 60\npriority=1\n");
    assert!(sup.reload());

    let after = sup.snapshot();
    assert_eq!(instance(&after, "a").pid, instance(&before, "a").pid);
}

#[test]
fn changed_command_respawns_only_that_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, TWO_PROGRAMS);
    let sup = supervisor(&path);
    sup.start_autostart();

    std::thread::sleep(Duration::from_secs(1));
    let before = sup.snapshot();

    write_config(
        &dir,
        "[program:a]\ncommand=/bin/sleep 61\nautostart=true\n\n\
         [program:b]\ncommand=/bin/sleep 60\nautostart=true\n",
    );
    assert!(sup.reload());

    let after = sup.snapshot();
    assert_ne!(
        instance(&after, "a").pid,
        instance(&before, "a").pid,
        "a changed and must have a fresh pid"
    );
    assert_eq!(
        instance(&after, "b").pid,
        instance(&before, "b").pid,
        "b is unchanged and must keep its pid"
    );
    assert!(instance(&after, "b").uptime >= instance(&before, "b").uptime);
    assert_eq!(instance(&after, "b").restart_count, 0);
    assert_eq!(instance(&after, "a").state, ProcessState::Running);
}

#[test]
fn dropped_program_is_stopped_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, TWO_PROGRAMS);
    let sup = supervisor(&path);
    sup.start_autostart();

    write_config(&dir, "[program:b]\ncommand=/bin/sleep 60\nautostart=true\n");
    assert!(sup.reload());

    let after = sup.snapshot();
    assert!(after.iter().all(|s| s.name != "a"), "a must be gone");
    assert_eq!(instance(&after, "b").state, ProcessState::Running);
}

#[test]
fn added_program_autostarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[program:a]\ncommand=/bin/sleep 60\nautostart=true\n");
    let sup = supervisor(&path);
    sup.start_autostart();

    write_config(&dir, TWO_PROGRAMS);
    assert!(sup.reload());

    let after = sup.snapshot();
    assert_eq!(instance(&after, "b").state, ProcessState::Running);
    assert!(instance(&after, "b").pid.is_some());
}

#[test]
fn numprocs_change_adds_and_removes_indexed_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "[program:w]\ncommand=/bin/sleep 60\nnumprocs=3\nautostart=true\n",
    );
    let sup = supervisor(&path);
    sup.start_autostart();
    assert_eq!(sup.snapshot().len(), 3);

    write_config(
        &dir,
        "[program:w]\ncommand=/bin/sleep 60\nnumprocs=2\nautostart=true\n",
    );
    assert!(sup.reload());

    let after = sup.snapshot();
    let names: Vec<&str> = after.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["w_0", "w_1"]);
}

#[test]
fn failed_reload_keeps_the_old_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[program:a]\ncommand=/bin/sleep 60\nautostart=true\n");
    let sup = supervisor(&path);
    sup.start_autostart();
    let before = sup.snapshot();

    write_config(&dir, "[program:a]\nthis is not ini\n");
    assert!(!sup.reload());

    let after = sup.snapshot();
    assert_eq!(instance(&after, "a").pid, instance(&before, "a").pid);
    assert_eq!(instance(&after, "a").state, ProcessState::Running);
}
