//! # Error types used by the taskmaster runtime.
//!
//! This module defines two main error enums:
//!
//! - [`ConfigError`] errors raised while loading or parsing the configuration.
//! - [`ProcessError`] errors raised while operating on a managed child.
//!
//! Both types provide helper methods `as_label` for logs.
//!
//! Shell-facing operations collapse these into a boolean result; the rich
//! detail travels through the event sink. Lookup of an unknown instance name
//! is reported as `false` directly (no state change), and transient reap
//! errors never escape [`Process::is_alive`](crate::core::Process::is_alive),
//! which falls back to a signal-0 probe internally.

use std::io;

use thiserror::Error;

/// # Errors produced while loading the configuration.
///
/// On initial load these are fatal to the supervisor; on reload the old
/// configuration keeps applying and the failure is reported to the shell.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be opened or read.
    #[error("could not read config file '{path}': {source}")]
    Unreadable {
        /// Path that was attempted.
        path: String,
        #[source]
        source: io::Error,
    },
    /// A line was neither a section header, a key=value pair, a comment,
    /// nor blank.
    #[error("syntax error in '{path}' line {line}: {content:?}")]
    Syntax {
        /// Path of the offending file.
        path: String,
        /// 1-based line number.
        line: usize,
        /// The offending line, verbatim.
        content: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Unreadable { .. } => "config_unreadable",
            ConfigError::Syntax { .. } => "config_syntax",
        }
    }
}

/// # Errors produced by operations on one managed child process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The child could not be spawned (fork/exec failure reported by the OS).
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The configured command string.
        command: String,
        #[source]
        source: io::Error,
    },
    /// Neither the configured stop signal nor the SIGKILL fallback could be
    /// delivered. Terminal for the instance.
    #[error("failed to deliver {signal} to pid {pid}: {errno}")]
    Stop {
        /// Name of the signal that failed to deliver.
        signal: &'static str,
        /// Target process id.
        pid: i32,
        /// OS error from `kill(2)`.
        errno: nix::errno::Errno,
    },
    /// The command string tokenized to an empty argv.
    #[error("empty command")]
    EmptyCommand,
}

impl ProcessError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Spawn { .. } => "process_spawn",
            ProcessError::Stop { .. } => "process_stop",
            ProcessError::EmptyCommand => "process_empty_command",
        }
    }
}
