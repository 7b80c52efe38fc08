//! # taskmaster
//!
//! **Taskmaster** is a process supervisor: given a declarative INI
//! configuration describing a set of programs, it spawns them as child
//! processes, monitors their health, restarts them according to policy,
//! exposes an interactive control shell, and hot-reloads configuration
//! without disturbing instances whose effective configuration is unchanged.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | Instance map, monitor sweep, bounded restarts, graceful shutdown.  | [`Supervisor`], [`ProcessState`]           |
//! | **Configuration** | INI program sections, instance expansion, hot-reload diff.         | [`ProgramConfig`], [`ConfigSource`]        |
//! | **Events**        | Structured lifecycle events fanned out to subscribers.             | [`Event`], [`EventKind`], [`Subscribe`]    |
//! | **Logging**       | Built-in file log subscriber (`taskmaster.log`).                   | [`LogWriter`]                              |
//! | **Shell**         | Line-oriented control surface (status/start/stop/reload/…).        | [`Shell`]                                  |
//! | **Metrics**       | `/proc` sampling for the detailed status view.                     | [`MetricsCollector`], [`ProcessMetrics`]   |
//! | **Errors**        | Typed errors for config loading and child operations.              | [`ConfigError`], [`ProcessError`]          |
//!
//! ```no_run
//! use std::io;
//! use std::sync::Arc;
//! use taskmaster::{IniConfigSource, LogWriter, Subscribe, Supervisor};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = Arc::new(LogWriter::open("taskmaster.log")?);
//!     let subscribers: Vec<Arc<dyn Subscribe>> = vec![log];
//!
//!     let source = IniConfigSource::new("taskmaster.conf");
//!     let supervisor = Supervisor::new(source, subscribers)?;
//!
//!     let stdin = io::stdin();
//!     supervisor.run(stdin.lock(), io::stdout());
//!     Ok(())
//! }
//! ```
//!
//! ---

mod clock;
mod config;
mod core;
mod error;
mod events;
mod metrics;
mod shell;
mod subscribers;

// ---- Public re-exports ----

pub use clock::{Clock, SteadyClock};
pub use config::{
    base_name, instance_names, AutoRestart, AutoStart, ConfigSource, IniConfigSource,
    ProgramConfig, ProgramMap,
};
pub use crate::core::{
    decide_restart, diff, effective_config_changed, register_signal_handlers, InstanceStatus,
    ProcessState, ReconcileAction, Supervisor, MONITOR_INTERVAL,
};
pub use error::{ConfigError, ProcessError};
pub use events::{Bus, Event, EventKind};
pub use metrics::{MetricsCollector, ProcessMetrics};
pub use shell::Shell;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
