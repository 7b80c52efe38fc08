//! # Supervisor: instance map, monitor thread, command surface.
//!
//! The [`Supervisor`] owns every [`Process`] behind one coarse mutex, runs
//! the monitor thread, and exposes the operations the shell dispatches to
//! (`start` / `stop` / `restart` / `status` / `reload` / `shutdown`).
//!
//! ## Architecture
//! ```text
//! ConfigSource ──► Supervisor::new()
//!                      │ expand programs → Process per instance (STOPPED)
//!                      │
//! Supervisor::run()
//!   ├──► start_autostart()        autostart=true instances spawn
//!   ├──► spawn_monitor()          1s sweep thread (Condvar-timed)
//!   │         ├──► health_sweep   reap + startup-grace classification
//!   │         └──► restart_sweep  decision table + bounded retries
//!   └──► Shell::run(stdin)        line commands until quit / EOF
//!              └──► shutdown()    stop monitor, stop every RUNNING child
//! ```
//!
//! ## Rules
//! - One mutex guards the instance map and all per-process state; every
//!   public operation and the whole monitor sweep serialize on it. That is
//!   what makes "no pid collision" and "no concurrent start on one
//!   instance" hold for free.
//! - The monitor waits on a condition variable with a one-second timeout
//!   predicated on `!running`, so `shutdown()` wakes it promptly.
//! - An OS termination signal is handled by the monitor thread itself: it
//!   stops every instance and exits the process with the signal number.
//! - `shutdown()` is idempotent; a second call is a no-op.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::{Clock, SteadyClock};
use crate::config::{expand_instances, AutoStart, ConfigSource, ProgramConfig};
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};
use crate::shell::Shell;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::process::{Process, ProcessState};
use super::reconcile::{self, ReconcileAction};
use super::{monitor, shutdown};

/// Period of the monitor sweep.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time view of one instance, for status rendering and tests.
#[derive(Debug, Clone)]
pub struct InstanceStatus {
    /// Instance name.
    pub name: String,
    /// Lifecycle state at snapshot time.
    pub state: ProcessState,
    /// Child pid, when one is held.
    pub pid: Option<i32>,
    /// Consecutive automatic restarts since the last reset.
    pub restart_count: u32,
    /// Exit code recorded by the most recent reap.
    pub last_exit_status: i32,
    /// Uptime at snapshot time (zero unless started).
    pub uptime: Duration,
    /// Instant of the most recent restart attempt, if any.
    pub last_restart: Option<std::time::Instant>,
}

/// Map state guarded by the supervisor mutex.
struct State {
    processes: BTreeMap<String, Process>,
    running: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

/// Owns the instance map, the monitor thread, and the command surface.
pub struct Supervisor {
    shared: Arc<Shared>,
    bus: Bus,
    source: Box<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Parses the configuration and creates every instance in STOPPED.
    ///
    /// A parse failure here is fatal: the supervisor is not constructed.
    pub fn new<S: ConfigSource + 'static>(
        source: S,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(source, subscribers, Arc::new(SteadyClock))
    }

    /// Like [`Supervisor::new`] with an explicit time source.
    pub fn with_clock<S: ConfigSource + 'static>(
        source: S,
        subscribers: Vec<Arc<dyn Subscribe>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let bus = Bus::new(SubscriberSet::new(subscribers));
        let programs = source.load()?;

        let mut processes = BTreeMap::new();
        for (instance, config) in expand_instances(&programs) {
            processes.insert(
                instance.clone(),
                Process::new(instance, config.clone(), bus.clone(), Arc::clone(&clock)),
            );
        }

        bus.publish(Event::now(EventKind::SupervisorStarted).with_detail(format!(
            "{} program configurations, {} total processes",
            programs.len(),
            processes.len()
        )));

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    processes,
                    running: false,
                }),
                wake: Condvar::new(),
            }),
            bus,
            source: Box::new(source),
            clock,
            monitor: Mutex::new(None),
        })
    }

    /// Number of managed instances.
    pub fn instance_count(&self) -> usize {
        self.shared.state.lock().unwrap().processes.len()
    }

    /// Runs the supervisor: autostart, monitor thread, then the command
    /// shell until `quit`/EOF, then shutdown.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) {
        self.start_autostart();
        self.spawn_monitor();
        let _ = writeln!(output, "TaskMaster is running. Type 'help' for commands.");
        Shell::new(self).run(input, output);
        self.shutdown();
    }

    /// Starts every instance whose program has `autostart = true`.
    pub fn start_autostart(&self) {
        let mut st = self.shared.state.lock().unwrap();
        st.running = true;
        for (name, process) in st.processes.iter_mut() {
            if process.config().autostart == AutoStart::Always && process.start().is_ok() {
                self.bus.publish(
                    Event::now(EventKind::ProcessStarted)
                        .with_process(name)
                        .with_pid(process.pid().unwrap_or(-1)),
                );
            }
        }
    }

    /// Spawns the monitor thread. Safe to call once per run.
    pub fn spawn_monitor(&self) {
        {
            let mut st = self.shared.state.lock().unwrap();
            st.running = true;
        }
        let shared = Arc::clone(&self.shared);
        let bus = self.bus.clone();
        let handle = thread::spawn(move || monitor_loop(&shared, &bus));
        *self.monitor.lock().unwrap() = Some(handle);
    }

    /// Starts an instance by name. Explicit start resets the retry counter.
    /// Returns `false` when the name is unknown or the spawn failed.
    pub fn start(&self, name: &str) -> bool {
        let mut st = self.shared.state.lock().unwrap();
        let Some(process) = st.processes.get_mut(name) else {
            return false;
        };
        process.reset_retries();
        let ok = process.start().is_ok();
        if ok {
            self.bus.publish(
                Event::now(EventKind::ProcessStarted)
                    .with_process(name)
                    .with_pid(process.pid().unwrap_or(-1)),
            );
        }
        ok
    }

    /// Stops an instance by name. Returns `false` when the name is unknown
    /// or the stop failed.
    pub fn stop(&self, name: &str) -> bool {
        let mut st = self.shared.state.lock().unwrap();
        let Some(process) = st.processes.get_mut(name) else {
            return false;
        };
        let pid = process.pid().unwrap_or(-1);
        let ok = process.stop().is_ok();
        if ok {
            self.bus.publish(
                Event::now(EventKind::ProcessStopped)
                    .with_process(name)
                    .with_pid(pid),
            );
        }
        ok
    }

    /// Restarts an instance by name, resetting the retry counter.
    pub fn restart(&self, name: &str) -> bool {
        let mut st = self.shared.state.lock().unwrap();
        let Some(process) = st.processes.get_mut(name) else {
            return false;
        };
        let ok = process.restart(true).is_ok();
        if ok {
            self.bus.publish(
                Event::now(EventKind::ProcessStarted)
                    .with_process(name)
                    .with_pid(process.pid().unwrap_or(-1)),
            );
        }
        ok
    }

    /// Renders the plain status report; with a filter, only that instance.
    pub fn status(&self, filter: Option<&str>) -> String {
        let st = self.shared.state.lock().unwrap();
        match filter {
            None => {
                let mut out = String::from("Process Status:\n");
                out.push_str("=====================================\n");
                for (name, process) in &st.processes {
                    out.push_str(&render_status_line(name, process));
                    out.push('\n');
                }
                out
            }
            Some(name) => match st.processes.get(name) {
                Some(process) => render_status_line(name, process),
                None => format!("Process not found: {name}"),
            },
        }
    }

    /// Point-in-time view of every instance, in name order.
    pub fn snapshot(&self) -> Vec<InstanceStatus> {
        let st = self.shared.state.lock().unwrap();
        st.processes
            .iter()
            .map(|(name, p)| InstanceStatus {
                name: name.clone(),
                state: p.state(),
                pid: p.pid(),
                restart_count: p.restart_count(),
                last_exit_status: p.last_exit_status(),
                uptime: p.uptime(),
                last_restart: p.last_restart(),
            })
            .collect()
    }

    /// Configured stdout/stderr log paths for an instance.
    pub fn log_files(&self, name: &str) -> Option<(String, String)> {
        let st = self.shared.state.lock().unwrap();
        st.processes
            .get(name)
            .map(|p| (p.config().stdout_log.clone(), p.config().stderr_log.clone()))
    }

    /// Re-parses the configuration and applies the reconcile diff.
    ///
    /// On a parse failure the previously installed configuration keeps
    /// applying and `false` is returned.
    pub fn reload(&self) -> bool {
        let fresh = match self.source.load() {
            Ok(map) => map,
            Err(err) => {
                self.bus.publish(
                    Event::now(EventKind::ConfigReloadFailed).with_detail(err.to_string()),
                );
                return false;
            }
        };

        let mut st = self.shared.state.lock().unwrap();
        let current: BTreeMap<String, ProgramConfig> = st
            .processes
            .iter()
            .map(|(name, p)| (name.clone(), p.config().clone()))
            .collect();

        for action in reconcile::diff(&current, &fresh) {
            match action {
                ReconcileAction::Remove { instance } => {
                    if let Some(mut process) = st.processes.remove(&instance) {
                        self.bus
                            .publish(Event::now(EventKind::ProcessRemoved).with_process(&instance));
                        if process.state() == ProcessState::Running {
                            let _ = process.stop();
                        }
                    }
                }
                ReconcileAction::Add { instance, config } => {
                    self.bus
                        .publish(Event::now(EventKind::ProcessAdded).with_process(&instance));
                    self.install(&mut st, instance, config);
                }
                ReconcileAction::Replace { instance, config } => {
                    self.bus
                        .publish(Event::now(EventKind::ProcessReplaced).with_process(&instance));
                    if let Some(process) = st.processes.get_mut(&instance) {
                        if process.state() == ProcessState::Running {
                            let _ = process.stop();
                        }
                    }
                    self.install(&mut st, instance, config);
                }
                ReconcileAction::Keep { .. } => {}
            }
        }

        self.bus.publish(Event::now(EventKind::ConfigReloaded));
        true
    }

    /// Constructs an instance, honors its autostart, and installs it,
    /// dropping any previous holder of the name.
    fn install(&self, st: &mut State, instance: String, config: ProgramConfig) {
        let autostart = config.autostart;
        let mut process = Process::new(
            instance.clone(),
            config,
            self.bus.clone(),
            Arc::clone(&self.clock),
        );
        if autostart == AutoStart::Always && process.start().is_ok() {
            self.bus.publish(
                Event::now(EventKind::ProcessStarted)
                    .with_process(&instance)
                    .with_pid(process.pid().unwrap_or(-1)),
            );
        }
        st.processes.insert(instance, process);
    }

    /// Stops the monitor, then stops every RUNNING instance. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut st = self.shared.state.lock().unwrap();
            if !st.running {
                return;
            }
            st.running = false;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.monitor.lock().unwrap().take() {
            let _ = handle.join();
        }

        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        let mut st = self.shared.state.lock().unwrap();
        stop_all(&mut st.processes, &self.bus);
        drop(st);
        self.bus.publish(Event::now(EventKind::SupervisorStopped));
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Formats one plain status line, e.g. `web: RUNNING (PID: 42, Uptime: 2s)`.
fn render_status_line(name: &str, process: &Process) -> String {
    let mut line = format!("{name}: {}", process.state());
    if process.state() == ProcessState::Running {
        line.push_str(&format!(
            " (PID: {}, Uptime: {}s)",
            process.pid().unwrap_or(-1),
            process.uptime().as_secs()
        ));
    }
    line
}

/// Stops every RUNNING instance, publishing a stop event per instance.
fn stop_all(processes: &mut BTreeMap<String, Process>, bus: &Bus) {
    for (name, process) in processes.iter_mut() {
        if process.state() == ProcessState::Running {
            let pid = process.pid().unwrap_or(-1);
            if process.stop().is_ok() {
                bus.publish(
                    Event::now(EventKind::ProcessStopped)
                        .with_process(name)
                        .with_pid(pid),
                );
            }
        }
    }
}

/// Monitor thread body: timed condvar wait, signal check, both sweeps.
fn monitor_loop(shared: &Shared, bus: &Bus) {
    loop {
        let guard = shared.state.lock().unwrap();
        let (mut st, _) = shared
            .wake
            .wait_timeout_while(guard, MONITOR_INTERVAL, |s| s.running)
            .unwrap();
        if !st.running {
            break;
        }

        if let Some(signum) = shutdown::take_pending_signal() {
            bus.publish(
                Event::now(EventKind::ShutdownRequested).with_detail(format!("signal {signum}")),
            );
            st.running = false;
            stop_all(&mut st.processes, bus);
            drop(st);
            bus.publish(Event::now(EventKind::SupervisorStopped));
            // Exiting kills the subscriber workers; give their queues a
            // moment to drain the final events.
            thread::sleep(Duration::from_millis(200));
            std::process::exit(signum);
        }

        monitor::health_sweep(&mut st.processes, bus);
        monitor::restart_sweep(&mut st.processes, bus);
    }
}
