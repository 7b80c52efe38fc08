//! # Runtime events emitted by the supervisor and managed processes.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Supervisor lifecycle**: startup, shutdown request, final stop
//! - **Process lifecycle**: spawn, reap, exit classification, restarts
//! - **Reconciliation**: hot-reload additions, removals, replacements
//! - **Sink internals**: subscriber overflow and panic reports
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! instance name, pid, exit code, and restart attempt counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Events for one instance are published from the thread
//! holding the supervisor lock, so for a given instance the sequence order
//! matches causal order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,

    // === Supervisor lifecycle events ===
    /// Supervisor finished construction and is about to run.
    SupervisorStarted,
    /// Shutdown requested (quit command or OS signal).
    ShutdownRequested,
    /// All managed processes have been stopped.
    SupervisorStopped,

    // === Process lifecycle events ===
    /// Instance spawned; pid recorded.
    ProcessStarted,
    /// Instance stopped on request.
    ProcessStopped,
    /// Child reaped; exit status recorded.
    ProcessExited,
    /// Exit matched the expected-exit policy.
    ExpectedExit,
    /// Exit did not match the expected-exit policy.
    DiedUnexpectedly,
    /// Child exited within the startup grace window.
    StartupFailure,
    /// Policy said not to restart; instance parked in STOPPED.
    NotRestarting,
    /// Monitor is about to attempt a restart.
    RestartScheduled,
    /// Restart budget exhausted; instance is FATAL.
    RetriesExhausted,
    /// Spawn failed outright (fork/exec error reported by the OS).
    SpawnFailed,
    /// Graceful-stop budget elapsed; escalating to SIGKILL.
    ForceKilling,

    // === Reconciliation events ===
    /// New instance added from configuration.
    ProcessAdded,
    /// Instance removed (no longer in configuration).
    ProcessRemoved,
    /// Instance torn down and respawned with changed configuration.
    ProcessReplaced,
    /// Configuration reloaded successfully.
    ConfigReloaded,
    /// Configuration reload failed; old configuration still applies.
    ConfigReloadFailed,
}

/// Runtime event with optional metadata.
///
/// Carries information about instance lifecycle, restarts, exit codes, and
/// timing. Constructed with [`Event::now`] and enriched through the
/// `with_*` builders.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (for log rendering only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Instance name, if applicable.
    pub process: Option<String>,
    /// Child pid, if relevant.
    pub pid: Option<i32>,
    /// Exit code of the most recent wait, if relevant.
    pub exit_code: Option<i32>,
    /// Restart attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Restart budget the attempt counts against.
    pub retries: Option<u32>,
    /// Uptime at the moment of the event, if relevant.
    pub uptime: Option<Duration>,
    /// Free-form detail (error text, signal name, reason).
    pub detail: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            process: None,
            pid: None,
            exit_code: None,
            attempt: None,
            retries: None,
            uptime: None,
            detail: None,
        }
    }

    /// Attaches an instance name.
    pub fn with_process(mut self, name: impl Into<String>) -> Self {
        self.process = Some(name.into());
        self
    }

    /// Attaches a pid.
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a restart attempt counter.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches the restart budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Attaches an uptime measurement.
    pub fn with_uptime(mut self, uptime: Duration) -> Self {
        self.uptime = Some(uptime);
        self
    }

    /// Attaches free-form detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Creates a subscriber overflow event.
    ///
    /// Emitted when a subscriber's queue is full and an event is dropped.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_detail(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_process(subscriber)
            .with_detail(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::ProcessStarted);
        let b = Event::now(EventKind::ProcessExited);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = Event::now(EventKind::RestartScheduled)
            .with_process("web_0")
            .with_attempt(2)
            .with_retries(3)
            .with_exit_code(1);
        assert_eq!(ev.process.as_deref(), Some("web_0"));
        assert_eq!(ev.attempt, Some(2));
        assert_eq!(ev.retries, Some(3));
        assert_eq!(ev.exit_code, Some(1));
    }
}
