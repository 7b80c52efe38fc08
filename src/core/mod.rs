//! Runtime core: the process state machine, the monitor, and the supervisor.
//!
//! ## Files & responsibilities
//! - **process.rs**: per-instance state machine; owns the spawned child,
//!   does the non-blocking reap, graceful stop with SIGKILL fallback, and
//!   the retry bookkeeping.
//! - **monitor.rs**: the two periodic sweeps (health, restart) plus the
//!   restart decision table. Runs under the supervisor lock.
//! - **reconcile.rs**: pure hot-reload diff producing ordered
//!   Remove/Add/Replace/Keep actions.
//! - **supervisor.rs**: public facade; owns the instance map behind one
//!   mutex + condvar, the monitor thread, and the command surface the shell
//!   dispatches to.
//! - **shutdown.rs**: async-signal-safe SIGINT/SIGTERM trampoline consumed
//!   by the monitor loop.
//!
//! ## Event data-plane (who publishes)
//! - **Supervisor** → `SupervisorStarted`, `ProcessStarted/Stopped`,
//!   `ProcessAdded/Removed/Replaced`, `ConfigReloaded/ReloadFailed`,
//!   `ShutdownRequested`, `SupervisorStopped`
//! - **monitor sweeps** → `StartupFailure`, `ExpectedExit`,
//!   `DiedUnexpectedly`, `NotRestarting`, `RestartScheduled`,
//!   `RetriesExhausted`
//! - **Process** → `ProcessExited` (reap), `SpawnFailed`, `ForceKilling`
//!
//! ## Locking
//! One supervisor-level mutex guards the instance map and all per-process
//! state. Public operations take it exclusively; the monitor holds it for a
//! whole sweep. Within one instance, transitions are totally ordered by the
//! lock; across instances the monitor visits in name order with no promised
//! ordering.

mod monitor;
mod process;
mod reconcile;
mod shutdown;
mod supervisor;

pub use monitor::decide_restart;
pub use process::{tokenize_command, ProcessState};
pub use reconcile::{diff, effective_config_changed, ReconcileAction};
pub use shutdown::{register_signal_handlers, take_pending_signal};
pub use supervisor::{InstanceStatus, Supervisor, MONITOR_INTERVAL};

pub(crate) use process::Process;
