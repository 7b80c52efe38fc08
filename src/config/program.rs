//! # Declarative program configuration.
//!
//! [`ProgramConfig`] is the immutable-after-parse description of one
//! `[program:<name>]` section. A program expands into `numprocs` named
//! instances; each running instance snapshots its config at construction and
//! is only ever updated by replacement during reconciliation.
//!
//! ## Instance naming
//! - `numprocs == 1` → the instance is named `name`
//! - `numprocs > 1`  → instances are named `name_0`, `name_1`, …

use std::collections::BTreeMap;

use nix::sys::signal::Signal;

/// Whether a program is launched at supervisor startup (or right after a
/// hot-add during reload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStart {
    /// Launch automatically.
    Always,
    /// Never launch automatically; wait for an explicit `start`.
    Never,
    /// Reserved tri-state accepted by the config format.
    Unexpected,
}

/// Whether an exited program is restarted by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRestart {
    /// Restart unconditionally, unless the exit code is expected.
    Always,
    /// Never restart automatically.
    Never,
    /// Restart only when the exit code is not in `expected_exit_codes`.
    Unexpected,
}

impl AutoStart {
    /// Case-insensitive parse of `true` / `false` / `unexpected`.
    /// Unrecognized values fall back to [`AutoStart::Always`].
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "false" => AutoStart::Never,
            "unexpected" => AutoStart::Unexpected,
            _ => AutoStart::Always,
        }
    }
}

impl AutoRestart {
    /// Case-insensitive parse of `true` / `false` / `unexpected`.
    /// Unrecognized values fall back to [`AutoRestart::Always`].
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "false" => AutoRestart::Never,
            "unexpected" => AutoRestart::Unexpected,
            _ => AutoRestart::Always,
        }
    }
}

/// Signal sent to a child for graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    #[default]
    Term,
    Kill,
    Int,
    Quit,
    Hup,
    Usr1,
    Usr2,
}

impl StopSignal {
    /// Parses a signal name. Returns `None` for anything outside the
    /// supported set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "TERM" => Some(StopSignal::Term),
            "KILL" => Some(StopSignal::Kill),
            "INT" => Some(StopSignal::Int),
            "QUIT" => Some(StopSignal::Quit),
            "HUP" => Some(StopSignal::Hup),
            "USR1" => Some(StopSignal::Usr1),
            "USR2" => Some(StopSignal::Usr2),
            _ => None,
        }
    }

    /// The OS signal to deliver.
    pub fn as_signal(self) -> Signal {
        match self {
            StopSignal::Term => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
            StopSignal::Int => Signal::SIGINT,
            StopSignal::Quit => Signal::SIGQUIT,
            StopSignal::Hup => Signal::SIGHUP,
            StopSignal::Usr1 => Signal::SIGUSR1,
            StopSignal::Usr2 => Signal::SIGUSR2,
        }
    }

    /// Signal name as written in the config file.
    pub fn name(self) -> &'static str {
        match self {
            StopSignal::Term => "TERM",
            StopSignal::Kill => "KILL",
            StopSignal::Int => "INT",
            StopSignal::Quit => "QUIT",
            StopSignal::Hup => "HUP",
            StopSignal::Usr1 => "USR1",
            StopSignal::Usr2 => "USR2",
        }
    }
}

/// Configuration of one program, as parsed from a `[program:<name>]` section.
///
/// ## Field semantics
/// - `command`: shell-free argv string; double-quoted spans preserve spaces
/// - `numprocs`: how many instances the program expands into
/// - `start_secs`: minimum uptime below which an exit is a startup failure
/// - `start_retries`: consecutive automatic restarts allowed before FATAL
/// - `stop_secs`: graceful-shutdown budget before the SIGKILL fallback
/// - `stdout_log` / `stderr_log`: path, `/dev/null`, or empty (inherit)
/// - `umask`: file-mode creation mask, parsed base-8
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Program name (section suffix). Non-empty, unique within a parse.
    pub name: String,
    /// Command line to execute, tokenized at spawn time.
    pub command: String,
    /// Number of instances to run.
    pub numprocs: u32,
    /// Reserved ordering hint; parsed and kept, not consumed by the core.
    pub priority: i32,
    /// Launch at supervisor startup / hot-add.
    pub autostart: AutoStart,
    /// Restart policy applied by the monitor.
    pub autorestart: AutoRestart,
    /// Exit codes considered "expected" by the restart policy.
    pub expected_exit_codes: Vec<i32>,
    /// Max consecutive automatic restart attempts before FATAL.
    pub start_retries: u32,
    /// Startup grace window in seconds.
    pub start_secs: u64,
    /// Signal for graceful stop.
    pub stop_signal: StopSignal,
    /// Seconds to wait for a graceful stop before SIGKILL.
    pub stop_secs: u64,
    /// Child stdout destination ("" = inherit, "/dev/null" = discard).
    pub stdout_log: String,
    /// Child stderr destination ("" = inherit, "/dev/null" = discard).
    pub stderr_log: String,
    /// Working directory the child chdirs into.
    pub workingdir: String,
    /// Environment overlaid on top of the supervisor's.
    pub environment: BTreeMap<String, String>,
    /// File-mode creation mask applied between fork and exec.
    pub umask: u32,
}

impl ProgramConfig {
    /// A config with the documented defaults and the given name.
    /// `command` starts empty; parsing rejects programs that leave it so.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: String::new(),
            numprocs: 1,
            priority: 999,
            autostart: AutoStart::Always,
            autorestart: AutoRestart::Always,
            expected_exit_codes: Vec::new(),
            start_retries: 3,
            start_secs: 1,
            stop_signal: StopSignal::default(),
            stop_secs: 10,
            stdout_log: String::new(),
            stderr_log: String::new(),
            workingdir: "/tmp".to_string(),
            environment: BTreeMap::new(),
            umask: 0o022,
        }
    }

    /// Membership test in `expected_exit_codes`.
    pub fn is_expected_exit(&self, code: i32) -> bool {
        self.expected_exit_codes.contains(&code)
    }

    /// Names of the instances this program expands into.
    pub fn instance_names(&self) -> Vec<String> {
        instance_names(&self.name, self.numprocs)
    }
}

/// Expands a program name into its instance names.
pub fn instance_names(name: &str, numprocs: u32) -> Vec<String> {
    if numprocs == 1 {
        vec![name.to_string()]
    } else {
        (0..numprocs).map(|i| format!("{name}_{i}")).collect()
    }
}

/// Strips a trailing `_<digits>` suffix, mapping an instance name back to
/// its program name. Names without such a suffix are returned unchanged.
pub fn base_name(instance: &str) -> &str {
    match instance.rfind('_') {
        Some(pos) if instance[pos + 1..].chars().all(|c| c.is_ascii_digit())
            && pos + 1 < instance.len() =>
        {
            &instance[..pos]
        }
        _ => instance,
    }
}
