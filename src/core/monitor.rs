//! # Monitor sweeps: exit detection and restart policy.
//!
//! The monitor thread runs both sweeps once per interval, under the
//! supervisor lock:
//!
//! 1. **Health sweep** — reap every RUNNING instance; an exit within the
//!    startup grace window is overridden to BACKOFF, anything later stays
//!    EXITED and is classified as expected or unexpected.
//! 2. **Restart sweep** — for every EXITED/BACKOFF instance, consult the
//!    restart decision table, enforce the retry budget (FATAL when spent),
//!    and otherwise back off one second and restart.
//!
//! ## Decision table
//! ```text
//! state   | autorestart | expected set | exit expected | restart?
//! --------+-------------+--------------+---------------+---------
//! BACKOFF | any         | —            | —             | yes
//! EXITED  | always      | empty        | —             | yes
//! EXITED  | always      | non-empty    | yes           | no
//! EXITED  | always      | non-empty    | no            | yes
//! EXITED  | unexpected  | —            | no            | yes
//! EXITED  | unexpected  | —            | yes           | no
//! EXITED  | never       | —            | —             | no
//! ```
//!
//! ## Rules
//! - Every sweep iteration is self-contained; nothing here can take the
//!   monitor thread down.
//! - Instances are visited in map (name) order; no cross-instance ordering
//!   is promised.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use crate::config::AutoRestart;
use crate::events::{Bus, Event, EventKind};

use super::process::{Process, ProcessState};

/// Reaps RUNNING instances and classifies fresh exits.
pub(crate) fn health_sweep(processes: &mut BTreeMap<String, Process>, bus: &Bus) {
    for (name, process) in processes.iter_mut() {
        if process.state() != ProcessState::Running {
            continue;
        }
        let pid = process.pid().unwrap_or(-1);
        if process.is_alive() {
            continue;
        }

        let exit_code = process.last_exit_status();
        let uptime = process.uptime();
        let start_secs = process.config().start_secs;

        if uptime.as_secs() < start_secs {
            bus.publish(
                Event::now(EventKind::StartupFailure)
                    .with_process(name)
                    .with_pid(pid)
                    .with_exit_code(exit_code)
                    .with_uptime(uptime)
                    .with_detail(format!(
                        "uptime: {}s < starttime: {}s",
                        uptime.as_secs(),
                        start_secs
                    )),
            );
            process.set_state(ProcessState::Backoff);
            continue;
        }

        let config = process.config();
        let unsurprising = process.is_expected_exit(exit_code)
            || config.autorestart == AutoRestart::Never
            || (config.autorestart == AutoRestart::Always
                && config.expected_exit_codes.is_empty());
        if unsurprising {
            bus.publish(
                Event::now(EventKind::ExpectedExit)
                    .with_process(name)
                    .with_pid(pid)
                    .with_exit_code(exit_code),
            );
        } else {
            bus.publish(
                Event::now(EventKind::DiedUnexpectedly)
                    .with_process(name)
                    .with_pid(pid)
                    .with_exit_code(exit_code),
            );
        }
    }
}

/// Applies the restart policy to every EXITED/BACKOFF instance.
pub(crate) fn restart_sweep(processes: &mut BTreeMap<String, Process>, bus: &Bus) {
    for (name, process) in processes.iter_mut() {
        let state = process.state();
        if state != ProcessState::Exited && state != ProcessState::Backoff {
            continue;
        }

        let autorestart = process.config().autorestart;
        let expected = process.config().expected_exit_codes.clone();
        let retries = process.config().start_retries;
        let exit_code = process.last_exit_status();

        if !decide_restart(state, autorestart, &expected, exit_code) {
            let reason = if autorestart == AutoRestart::Never {
                "autorestart=false"
            } else {
                "expected exit"
            };
            bus.publish(
                Event::now(EventKind::NotRestarting)
                    .with_process(name)
                    .with_exit_code(exit_code)
                    .with_detail(reason),
            );
            process.set_state(ProcessState::Stopped);
            continue;
        }

        if process.restart_count() >= retries {
            bus.publish(
                Event::now(EventKind::RetriesExhausted)
                    .with_process(name)
                    .with_retries(retries),
            );
            process.set_state(ProcessState::Fatal);
            continue;
        }

        bus.publish(
            Event::now(EventKind::RestartScheduled)
                .with_process(name)
                .with_attempt(process.restart_count() + 1)
                .with_retries(retries)
                .with_exit_code(exit_code),
        );
        thread::sleep(Duration::from_secs(1));
        if process.restart(false).is_ok() {
            bus.publish(
                Event::now(EventKind::ProcessStarted)
                    .with_process(name)
                    .with_pid(process.pid().unwrap_or(-1)),
            );
        }
    }
}

/// The restart decision table.
///
/// BACKOFF always retries (the retry budget is enforced separately); EXITED
/// consults the autorestart policy against the expected-exit set.
pub fn decide_restart(
    state: ProcessState,
    autorestart: AutoRestart,
    expected_exit_codes: &[i32],
    exit_code: i32,
) -> bool {
    if state == ProcessState::Backoff {
        return true;
    }
    let expected = expected_exit_codes.contains(&exit_code);
    match autorestart {
        AutoRestart::Always => expected_exit_codes.is_empty() || !expected,
        AutoRestart::Unexpected => !expected,
        AutoRestart::Never => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessState::{Backoff, Exited};

    #[test]
    fn backoff_always_restarts() {
        assert!(decide_restart(Backoff, AutoRestart::Never, &[0], 0));
        assert!(decide_restart(Backoff, AutoRestart::Always, &[], 1));
        assert!(decide_restart(Backoff, AutoRestart::Unexpected, &[0], 0));
    }

    #[test]
    fn always_with_empty_set_restarts() {
        assert!(decide_restart(Exited, AutoRestart::Always, &[], 0));
        assert!(decide_restart(Exited, AutoRestart::Always, &[], 1));
    }

    #[test]
    fn always_with_expected_exit_does_not_restart() {
        assert!(!decide_restart(Exited, AutoRestart::Always, &[0], 0));
        assert!(decide_restart(Exited, AutoRestart::Always, &[0], 1));
    }

    #[test]
    fn unexpected_restarts_only_on_surprise() {
        assert!(!decide_restart(Exited, AutoRestart::Unexpected, &[0], 0));
        assert!(decide_restart(Exited, AutoRestart::Unexpected, &[0], 1));
    }

    #[test]
    fn never_never_restarts() {
        assert!(!decide_restart(Exited, AutoRestart::Never, &[], 1));
        assert!(!decide_restart(Exited, AutoRestart::Never, &[0], 0));
    }

    mod sweeps {
        use super::*;
        use crate::clock::Clock;
        use crate::config::ProgramConfig;
        use crate::subscribers::SubscriberSet;
        use std::sync::Arc;
        use std::time::Instant;

        /// Clock that never advances, pinning uptime at zero.
        struct FrozenClock(Instant);

        impl Clock for FrozenClock {
            fn now(&self) -> Instant {
                self.0
            }
        }

        fn table_with(config: ProgramConfig) -> BTreeMap<String, Process> {
            let bus = Bus::new(SubscriberSet::new(Vec::new()));
            let clock = Arc::new(FrozenClock(Instant::now()));
            let mut processes = BTreeMap::new();
            processes.insert(
                "t".to_string(),
                Process::new("t", config, bus, clock),
            );
            processes
        }

        fn start_and_let_exit(processes: &mut BTreeMap<String, Process>) {
            let p = processes.get_mut("t").unwrap();
            p.start().unwrap();
            // /bin/true exits almost immediately; leave it unreaped so the
            // sweep observes a RUNNING instance with a dead child.
            std::thread::sleep(Duration::from_millis(300));
            assert_eq!(p.state(), ProcessState::Running);
        }

        #[test]
        fn exit_within_grace_is_overridden_to_backoff() {
            let mut config = ProgramConfig::new("t");
            config.command = "/bin/true".to_string();
            config.start_secs = 5;
            let mut processes = table_with(config);
            start_and_let_exit(&mut processes);

            let bus = Bus::new(SubscriberSet::new(Vec::new()));
            health_sweep(&mut processes, &bus);
            assert_eq!(processes["t"].state(), ProcessState::Backoff);
        }

        #[test]
        fn exit_after_grace_stays_exited() {
            let mut config = ProgramConfig::new("t");
            config.command = "/bin/true".to_string();
            config.start_secs = 0;
            let mut processes = table_with(config);
            start_and_let_exit(&mut processes);

            let bus = Bus::new(SubscriberSet::new(Vec::new()));
            health_sweep(&mut processes, &bus);
            assert_eq!(processes["t"].state(), ProcessState::Exited);
        }

        #[test]
        fn no_restart_policy_parks_in_stopped() {
            let mut config = ProgramConfig::new("t");
            config.command = "/bin/true".to_string();
            config.start_secs = 0;
            config.autorestart = AutoRestart::Never;
            let mut processes = table_with(config);
            start_and_let_exit(&mut processes);

            let bus = Bus::new(SubscriberSet::new(Vec::new()));
            health_sweep(&mut processes, &bus);
            restart_sweep(&mut processes, &bus);
            assert_eq!(processes["t"].state(), ProcessState::Stopped);
            assert_eq!(processes["t"].restart_count(), 0);
        }

        #[test]
        fn spent_retry_budget_goes_fatal_without_another_attempt() {
            let mut config = ProgramConfig::new("t");
            config.command = "/bin/true".to_string();
            config.start_secs = 5;
            config.start_retries = 0;
            let mut processes = table_with(config);
            start_and_let_exit(&mut processes);

            let bus = Bus::new(SubscriberSet::new(Vec::new()));
            health_sweep(&mut processes, &bus);
            assert_eq!(processes["t"].state(), ProcessState::Backoff);
            restart_sweep(&mut processes, &bus);
            assert_eq!(processes["t"].state(), ProcessState::Fatal);
        }
    }
}
