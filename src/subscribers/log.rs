//! # File logging subscriber.
//!
//! [`LogWriter`] renders events as timestamped, leveled lines and appends
//! them to the supervisor log file (`taskmaster.log` by default).
//!
//! ## Output format
//! ```text
//! [2026-08-02 14:03:11.042] [INFO] Started process web_0 with PID 4242
//! [2026-08-02 14:03:14.561] [ERROR] Process web_0 died during startup period (uptime: 0s < starttime: 5s)
//! [2026-08-02 14:03:15.570] [INFO] Attempting to restart web_0 (attempt 1/3)
//! ```
//!
//! The log format is not a compatibility surface; it exists for operators
//! reading the file with their eyes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Severity attached to a rendered log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

/// Subscriber appending rendered events to a log file.
pub struct LogWriter {
    file: Mutex<File>,
}

impl LogWriter {
    /// Opens (append-create) the given log file.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl Subscribe for LogWriter {
    fn on_event(&self, event: &Event) {
        let (level, message) = render(event);
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{stamp}] [{}] {message}", level.as_str());
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

/// Renders an event into a severity and a human-readable message.
pub fn render(ev: &Event) -> (Level, String) {
    let name = ev.process.as_deref().unwrap_or("?");
    let pid = ev.pid.unwrap_or(-1);
    let code = ev.exit_code.unwrap_or(-1);
    let detail = ev.detail.as_deref();

    match ev.kind {
        EventKind::SupervisorStarted => {
            let msg = match detail {
                Some(d) => format!("TaskMaster starting up ({d})"),
                None => "TaskMaster starting up".to_string(),
            };
            (Level::Info, msg)
        }
        EventKind::ShutdownRequested => {
            let msg = match detail {
                Some(d) => format!("Received {d}. Shutting down TaskMaster..."),
                None => "Shutting down TaskMaster...".to_string(),
            };
            (Level::Info, msg)
        }
        EventKind::SupervisorStopped => (Level::Info, "TaskMaster shutting down".to_string()),

        EventKind::ProcessStarted => (
            Level::Info,
            format!("Started process {name} with PID {pid}"),
        ),
        EventKind::ProcessStopped => {
            (Level::Info, format!("Stopped process {name} (PID: {pid})"))
        }
        EventKind::ProcessExited => (
            Level::Info,
            format!("Process {name} (PID: {pid}) exited with status {code}"),
        ),
        EventKind::ExpectedExit => (
            Level::Info,
            format!("Process {name} (PID: {pid}) exited with expected status {code}"),
        ),
        EventKind::DiedUnexpectedly => (
            Level::Warning,
            format!("Process {name} (PID: {pid}) has died unexpectedly"),
        ),
        EventKind::StartupFailure => {
            let why = detail.unwrap_or("within startup grace");
            (
                Level::Error,
                format!("Process {name} (PID: {pid}) died during startup period ({why})"),
            )
        }
        EventKind::NotRestarting => {
            let why = detail.unwrap_or("policy");
            (
                Level::Info,
                format!("Process {name} exited with code {code}, not restarting ({why})"),
            )
        }
        EventKind::RestartScheduled => {
            let attempt = ev.attempt.unwrap_or(0);
            let retries = ev.retries.unwrap_or(0);
            (
                Level::Info,
                format!("Attempting to restart {name} (attempt {attempt}/{retries})"),
            )
        }
        EventKind::RetriesExhausted => (
            Level::Error,
            format!("Process {name} has exceeded maximum restart attempts and is in FATAL state"),
        ),
        EventKind::SpawnFailed => {
            let why = detail.unwrap_or("unknown error");
            (Level::Error, format!("Failed to spawn process {name}: {why}"))
        }
        EventKind::ForceKilling => (
            Level::Warning,
            format!("Process {name} did not stop gracefully, force killing..."),
        ),

        EventKind::ProcessAdded => (
            Level::Info,
            format!("Adding new process {name} from configuration"),
        ),
        EventKind::ProcessRemoved => (
            Level::Info,
            format!("Removing process {name} (no longer in configuration)"),
        ),
        EventKind::ProcessReplaced => (
            Level::Info,
            format!("Configuration changed for process {name}, restarting"),
        ),
        EventKind::ConfigReloaded => {
            (Level::Info, "Configuration reloaded successfully".to_string())
        }
        EventKind::ConfigReloadFailed => {
            let why = detail.unwrap_or("unknown error");
            (Level::Error, format!("Failed to reload configuration: {why}"))
        }

        EventKind::SubscriberOverflow => {
            let why = detail.unwrap_or("queue full");
            (Level::Warning, format!("Subscriber dropped an event: {why}"))
        }
        EventKind::SubscriberPanicked => {
            let why = detail.unwrap_or("panic");
            (Level::Error, format!("Subscriber {name} panicked: {why}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_restart_attempt_line() {
        let ev = Event::now(EventKind::RestartScheduled)
            .with_process("web")
            .with_attempt(2)
            .with_retries(3);
        let (level, msg) = render(&ev);
        assert_eq!(level, Level::Info);
        assert_eq!(msg, "Attempting to restart web (attempt 2/3)");
    }

    #[test]
    fn renders_unexpected_death_as_warning() {
        let ev = Event::now(EventKind::DiedUnexpectedly)
            .with_process("db")
            .with_pid(99);
        let (level, msg) = render(&ev);
        assert_eq!(level, Level::Warning);
        assert_eq!(msg, "Process db (PID: 99) has died unexpectedly");
    }

    #[test]
    fn renders_startup_failure_with_detail() {
        let ev = Event::now(EventKind::StartupFailure)
            .with_process("web")
            .with_pid(7)
            .with_detail("uptime: 0s < starttime: 5s");
        let (level, msg) = render(&ev);
        assert_eq!(level, Level::Error);
        assert_eq!(
            msg,
            "Process web (PID: 7) died during startup period (uptime: 0s < starttime: 5s)"
        );
    }

    #[test]
    fn log_writer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let writer = LogWriter::open(&path).unwrap();
        writer.on_event(&Event::now(EventKind::ConfigReloaded));
        writer.on_event(
            &Event::now(EventKind::ProcessStarted)
                .with_process("a")
                .with_pid(1),
        );
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[INFO] Configuration reloaded successfully"));
        assert!(lines[1].contains("Started process a with PID 1"));
    }
}
