//! # Process: per-instance state machine.
//!
//! Supervises one spawned child with a snapshot of its [`ProgramConfig`]:
//! - spawn with child-side setup (log redirection, chdir, umask, environment),
//! - graceful stop with a SIGKILL fallback,
//! - non-blocking reap that records the exit status,
//! - bounded-retry bookkeeping consumed by the monitor sweep.
//!
//! ## State machine
//! ```text
//! STOPPED  ──start()──► STARTING ──spawn ok──► RUNNING
//! STOPPED  ──start() spawn fail──► FATAL
//! RUNNING  ──child exits within start_secs──► BACKOFF   (monitor classifies)
//! RUNNING  ──child exits after  start_secs──► EXITED
//! RUNNING  ──stop()──► STOPPING ──reaped──► STOPPED
//! STOPPING ──stop_secs elapsed──► SIGKILL ──reaped──► STOPPED
//! STOPPING ──kill undeliverable──► FATAL
//! BACKOFF/EXITED ──monitor restart──► STARTING (restart_count++)
//! BACKOFF/EXITED ──policy says no──► STOPPED
//! ```
//!
//! ## Rules
//! - A pid is held exactly while state is RUNNING, STARTING, or STOPPING.
//! - All transitions happen under the supervisor lock; `Process` exposes no
//!   operation that races with another under normal use.
//! - The OS is the source of truth for liveness: `is_alive` reaps with a
//!   non-hanging wait and falls back to a signal-0 probe on wait errors.

use std::fmt;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::{umask, Mode};
use nix::unistd::Pid;

use crate::clock::Clock;
use crate::config::ProgramConfig;
use crate::error::ProcessError;
use crate::events::{Bus, Event, EventKind};

/// Lifecycle state of one managed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not running; either never started or parked by policy.
    Stopped,
    /// Spawn in progress.
    Starting,
    /// Child is (believed) alive.
    Running,
    /// Child died within the startup grace window; retry pending.
    Backoff,
    /// Graceful stop in progress.
    Stopping,
    /// Child exited after the grace window; the restart decision is pending.
    Exited,
    /// Terminal until an explicit user start/restart.
    Fatal,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Stopped => "STOPPED",
            ProcessState::Starting => "STARTING",
            ProcessState::Running => "RUNNING",
            ProcessState::Backoff => "BACKOFF",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Exited => "EXITED",
            ProcessState::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// One managed instance: config snapshot, owned child, retry bookkeeping.
pub struct Process {
    /// Instance name (`prog` or `prog_<i>`).
    name: String,
    /// Config snapshot taken at construction; replaced, never mutated.
    config: ProgramConfig,
    state: ProcessState,
    child: Option<Child>,
    restart_count: u32,
    last_exit_status: i32,
    start_time: Option<Instant>,
    last_restart: Option<Instant>,
    bus: Bus,
    clock: Arc<dyn Clock>,
}

impl Process {
    /// Creates an instance in STOPPED with no child.
    pub fn new(
        name: impl Into<String>,
        config: ProgramConfig,
        bus: Bus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            state: ProcessState::Stopped,
            child: None,
            restart_count: 0,
            last_exit_status: 0,
            start_time: None,
            last_restart: None,
            bus,
            clock,
        }
    }

    /// The configuration snapshot this instance runs under.
    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Forces a state transition. Used by the monitor sweep for the
    /// classification overrides (BACKOFF, STOPPED, FATAL); callers hold the
    /// supervisor lock.
    pub(crate) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    /// Child pid, present exactly while RUNNING / STARTING / STOPPING.
    pub fn pid(&self) -> Option<i32> {
        self.child.as_ref().map(|c| c.id() as i32)
    }

    /// Consecutive automatic restarts since the counter was last reset.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Exit code recorded by the most recent reap.
    pub fn last_exit_status(&self) -> i32 {
        self.last_exit_status
    }

    /// Instant of the most recent restart attempt, if any.
    pub fn last_restart(&self) -> Option<Instant> {
        self.last_restart
    }

    /// Clears the retry counter. Explicit user start/restart goes through
    /// this; automatic restarts do not.
    pub(crate) fn reset_retries(&mut self) {
        self.restart_count = 0;
    }

    /// Membership test in the configured expected exit codes.
    pub fn is_expected_exit(&self, code: i32) -> bool {
        self.config.is_expected_exit(code)
    }

    /// Time since the last successful spawn; zero when STOPPED or FATAL.
    pub fn uptime(&self) -> Duration {
        match self.state {
            ProcessState::Stopped | ProcessState::Fatal => Duration::ZERO,
            _ => self
                .start_time
                .map(|t| self.clock.now().saturating_duration_since(t))
                .unwrap_or(Duration::ZERO),
        }
    }

    /// Spawns the child. No-op success when already RUNNING.
    ///
    /// The parent does not wait for the child here; liveness is observed
    /// later through [`Process::is_alive`]. An exec that launches and dies
    /// immediately surfaces as an early exit caught by the startup grace.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        if self.state == ProcessState::Running {
            return Ok(());
        }

        self.state = ProcessState::Starting;
        match self.spawn_child() {
            Ok(child) => {
                self.child = Some(child);
                self.state = ProcessState::Running;
                self.start_time = Some(self.clock.now());
                Ok(())
            }
            Err(err) => {
                self.state = ProcessState::Fatal;
                self.bus.publish(
                    Event::now(EventKind::SpawnFailed)
                        .with_process(&self.name)
                        .with_detail(err.to_string()),
                );
                Err(err)
            }
        }
    }

    /// Gracefully stops the child. No-op success unless RUNNING.
    ///
    /// Sends the configured stop signal, polls once per second for up to
    /// `stop_secs`, then escalates to SIGKILL and waits one more second.
    /// Persistent failure to deliver any signal is terminal (FATAL).
    pub fn stop(&mut self) -> Result<(), ProcessError> {
        if self.state != ProcessState::Running {
            return Ok(());
        }
        let pid = self.pid().unwrap_or(-1);
        self.state = ProcessState::Stopping;

        match self.signal(self.config.stop_signal.as_signal()) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                // Already gone; reap whatever is left and finish.
                let _ = self.is_alive();
                self.finish_stop();
                return Ok(());
            }
            Err(errno) => {
                self.state = ProcessState::Fatal;
                return Err(ProcessError::Stop {
                    signal: self.config.stop_signal.name(),
                    pid,
                    errno,
                });
            }
        }

        for _ in 0..self.config.stop_secs {
            if !self.is_alive() {
                self.finish_stop();
                return Ok(());
            }
            thread::sleep(Duration::from_secs(1));
        }
        if !self.is_alive() {
            self.finish_stop();
            return Ok(());
        }

        self.bus.publish(
            Event::now(EventKind::ForceKilling)
                .with_process(&self.name)
                .with_pid(pid),
        );
        match self.signal(Signal::SIGKILL) {
            Ok(()) => {
                // SIGKILL lands fast; poll up to one more second for the reap.
                for _ in 0..10 {
                    if !self.is_alive() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(100));
                }
                self.finish_stop();
                Ok(())
            }
            Err(Errno::ESRCH) => {
                let _ = self.is_alive();
                self.finish_stop();
                Ok(())
            }
            Err(errno) => {
                self.state = ProcessState::Fatal;
                Err(ProcessError::Stop {
                    signal: "KILL",
                    pid,
                    errno,
                })
            }
        }
    }

    /// Stops (when running) and starts again.
    ///
    /// `reset_retries = true` is the explicit user path: the counter goes
    /// back to zero. The monitor's automatic path increments it instead.
    pub fn restart(&mut self, reset_retries: bool) -> Result<(), ProcessError> {
        if self.state == ProcessState::Running {
            self.stop()?;
        }
        if reset_retries {
            self.restart_count = 0;
        } else {
            self.restart_count += 1;
        }
        self.last_restart = Some(self.clock.now());
        self.start()
    }

    /// Non-blocking reap.
    ///
    /// - child exited → records `last_exit_status`, clears the pid, sets
    ///   EXITED, publishes the reap event, returns `false`
    /// - child alive → returns `true`
    /// - wait error (including "no such child") → signal-0 probe decides;
    ///   a dead verdict clears the pid and sets EXITED
    pub fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        let pid = child.id() as i32;

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code_of(status);
                self.last_exit_status = code;
                self.child = None;
                self.state = ProcessState::Exited;
                self.bus.publish(
                    Event::now(EventKind::ProcessExited)
                        .with_process(&self.name)
                        .with_pid(pid)
                        .with_exit_code(code),
                );
                false
            }
            Ok(None) => true,
            Err(_) => match kill(Pid::from_raw(pid), None) {
                Ok(()) => true,
                Err(_) => {
                    self.child = None;
                    self.state = ProcessState::Exited;
                    false
                }
            },
        }
    }

    fn finish_stop(&mut self) {
        self.child = None;
        self.state = ProcessState::Stopped;
    }

    fn signal(&self, sig: Signal) -> Result<(), Errno> {
        match self.pid() {
            Some(pid) => kill(Pid::from_raw(pid), sig),
            None => Err(Errno::ESRCH),
        }
    }

    /// Builds and spawns the child command.
    ///
    /// Setup applied to the child: stdout/stderr redirection (append-create
    /// 0644, `/dev/null`, or inherit), working directory, environment
    /// overlay, and the umask between fork and exec (the only child-side
    /// hook; `umask(2)` is async-signal-safe). The executable is resolved
    /// through PATH.
    fn spawn_child(&self) -> Result<Child, ProcessError> {
        let argv = tokenize_command(&self.config.command);
        if argv.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if let Some(stdout) = open_log_target(&self.config.stdout_log) {
            cmd.stdout(stdout);
        }
        if let Some(stderr) = open_log_target(&self.config.stderr_log) {
            cmd.stderr(stderr);
        }
        cmd.current_dir(&self.config.workingdir);
        cmd.envs(&self.config.environment);

        let mask = Mode::from_bits_truncate(self.config.umask as nix::libc::mode_t);
        unsafe {
            cmd.pre_exec(move || {
                umask(mask);
                Ok(())
            });
        }

        cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: self.config.command.clone(),
            source,
        })
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // The instance owns its child: kill and reap on destruction.
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Maps an [`ExitStatus`] to the supervisord-style exit code: the plain code
/// when the child exited, `128 + signal` when it was killed by a signal.
fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Opens the configured log destination for a child stream.
///
/// Empty path → `None` (inherit the supervisor's fd). `/dev/null` →
/// write-only sink. Anything else → append-create with mode 0644. An open
/// failure falls back to inheriting.
fn open_log_target(path: &str) -> Option<Stdio> {
    if path.is_empty() {
        return None;
    }
    let file = if path == "/dev/null" {
        OpenOptions::new().write(true).open("/dev/null")
    } else {
        OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(path)
    };
    file.ok().map(Stdio::from)
}

/// Tokenizes a command string into argv.
///
/// Double-quoted spans preserve internal whitespace; a backslash before a
/// quote yields a literal quote. No other shell metacharacters are
/// interpreted.
pub fn tokenize_command(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
