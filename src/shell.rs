//! # Interactive command shell.
//!
//! Line-oriented REPL driving the [`Supervisor`] command surface. Reads
//! newline-terminated commands from any [`BufRead`], writes results to any
//! [`Write`]; the binary wires it to stdin/stdout.
//!
//! ## Commands
//! ```text
//! status [name]            plain per-instance report
//! status --detailed [name] colored report with CPU / memory / fds
//! stats                    aggregate counters and health score
//! logs <name> [lines]      tail the instance's log files
//! start <name>             start an instance
//! stop <name>              stop an instance
//! restart <name>           restart an instance (resets the retry counter)
//! reload                   re-read the config and apply the diff
//! clear                    clear the terminal
//! quit / exit              leave the shell; the supervisor shuts down
//! help                     list commands
//! ```
//!
//! Unknown commands print an error and the loop continues. An EOF on the
//! input behaves like `quit`.

use std::fs;
use std::io::{BufRead, Write};

use colored::Colorize;

use crate::core::{InstanceStatus, ProcessState, Supervisor};
use crate::metrics::MetricsCollector;

/// REPL over a borrowed supervisor.
pub struct Shell<'a> {
    supervisor: &'a Supervisor,
}

impl<'a> Shell<'a> {
    /// Creates a shell bound to the supervisor.
    pub fn new(supervisor: &'a Supervisor) -> Self {
        Self { supervisor }
    }

    /// Runs the prompt loop until `quit`, `exit`, or EOF.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) {
        let mut line = String::new();
        loop {
            let _ = write!(output, "taskmaster> ");
            let _ = output.flush();

            line.clear();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if !self.execute(command, &mut output) {
                break;
            }
        }
    }

    /// Dispatches one command line. Returns `false` to leave the loop.
    fn execute<W: Write>(&self, line: &str, out: &mut W) -> bool {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match command {
            "status" => self.cmd_status(&args, out),
            "start" => self.cmd_lifecycle(&args, out, "start", |name| self.supervisor.start(name)),
            "stop" => self.cmd_lifecycle(&args, out, "stop", |name| self.supervisor.stop(name)),
            "restart" => {
                self.cmd_lifecycle(&args, out, "restart", |name| self.supervisor.restart(name))
            }
            "reload" => {
                if self.supervisor.reload() {
                    let _ = writeln!(out, "Configuration reloaded");
                } else {
                    let _ = writeln!(out, "Failed to reload configuration");
                }
            }
            "stats" => self.cmd_stats(out),
            "logs" => self.cmd_logs(&args, out),
            "clear" => {
                let _ = write!(out, "\x1b[2J\x1b[1;1H");
                let _ = out.flush();
            }
            "quit" | "exit" => return false,
            "help" => print_help(out),
            unknown => {
                let _ = writeln!(
                    out,
                    "Unknown command: {unknown}. Type 'help' for available commands."
                );
            }
        }
        true
    }

    fn cmd_lifecycle<W: Write>(
        &self,
        args: &[&str],
        out: &mut W,
        verb: &str,
        op: impl Fn(&str) -> bool,
    ) {
        let Some(&name) = args.first() else {
            let _ = writeln!(out, "Usage: {verb} <program_name>");
            return;
        };
        let past = match verb {
            "start" => "Started",
            "stop" => "Stopped",
            _ => "Restarted",
        };
        if op(name) {
            let _ = writeln!(out, "{past} {name}");
        } else {
            let _ = writeln!(out, "Failed to {verb} {name}");
        }
    }

    fn cmd_status<W: Write>(&self, args: &[&str], out: &mut W) {
        let mut detailed = false;
        let mut filter: Option<&str> = None;
        for &arg in args {
            if arg == "--detailed" {
                detailed = true;
            } else {
                filter = Some(arg);
            }
        }

        if detailed {
            self.print_detailed_status(filter, out);
        } else {
            let _ = writeln!(out, "{}", self.supervisor.status(filter));
        }
    }

    fn print_detailed_status<W: Write>(&self, filter: Option<&str>, out: &mut W) {
        let _ = writeln!(out, "\nProcess Status (Detailed):");
        let _ = writeln!(out, "==========================================");

        let mut found_any = false;
        for status in self.supervisor.snapshot() {
            if let Some(f) = filter {
                if !status.name.contains(f) {
                    continue;
                }
            }
            print_instance_details(&status, out);
            let _ = writeln!(out);
            found_any = true;
        }

        if let Some(f) = filter {
            if !found_any {
                let _ = writeln!(out, "No processes found matching: {f}");
            }
        }
    }

    fn cmd_stats<W: Write>(&self, out: &mut W) {
        print_stats(&self.supervisor.snapshot(), out);
    }

    fn cmd_logs<W: Write>(&self, args: &[&str], out: &mut W) {
        let Some(&name) = args.first() else {
            let _ = writeln!(out, "Usage: logs <process_name> [lines]");
            let _ = writeln!(out, "Example: logs nginx 20");
            return;
        };
        let lines = args
            .get(1)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);

        let Some((stdout_log, stderr_log)) = self.supervisor.log_files(name) else {
            let _ = writeln!(out, "Process not found: {name}");
            return;
        };

        let _ = writeln!(out, "\n{}", format!("Logs for {name} (last {lines} lines):").bold());
        let _ = writeln!(out, "=========================================");

        let has_stdout = !stdout_log.is_empty() && stdout_log != "/dev/null";
        let has_stderr = !stderr_log.is_empty() && stderr_log != "/dev/null";

        if has_stdout {
            let _ = writeln!(out, "{} {stdout_log}:", "[STDOUT]".green());
            print_log_tail(&stdout_log, lines, out);
        }
        if has_stderr {
            let _ = writeln!(out, "\n{} {stderr_log}:", "[STDERR]".red());
            print_log_tail(&stderr_log, lines, out);
        }
        if !has_stdout && !has_stderr {
            let _ = writeln!(out, "{}", "No log files configured for this process.".yellow());
            let _ = writeln!(out, "Output goes to console or /dev/null.");
        }
    }
}

/// Prints the last `lines` lines of a file with line numbers.
fn print_log_tail<W: Write>(path: &str, lines: usize, out: &mut W) {
    let Ok(text) = fs::read_to_string(path) else {
        let _ = writeln!(out, "{}", format!("Error: Could not open log file: {path}").red());
        return;
    };
    let all: Vec<&str> = text.lines().collect();
    if all.is_empty() {
        let _ = writeln!(out, "{}", "(Log file is empty)".yellow());
        return;
    }
    let start = all.len().saturating_sub(lines);
    for (offset, line) in all[start..].iter().enumerate() {
        let _ = writeln!(out, "{:4} | {line}", start + offset + 1);
    }
    if start > 0 {
        let _ = writeln!(
            out,
            "{}",
            format!("... (showing last {lines} of {} total lines)", all.len()).yellow()
        );
    }
}

fn print_instance_details<W: Write>(status: &InstanceStatus, out: &mut W) {
    let state_str = color_state(status.state, &status.state.to_string());
    match status.state {
        ProcessState::Running => {
            let pid = status.pid.unwrap_or(-1);
            let metrics = MetricsCollector::collect(pid, status.uptime);
            let _ = writeln!(
                out,
                "{}: {state_str} (PID: {pid}, Uptime: {})",
                status.name,
                MetricsCollector::format_uptime(status.uptime)
            );
            let mut memory = format!(
                "CPU: {:.1}% | Memory: {}",
                metrics.cpu_percent,
                MetricsCollector::format_bytes(metrics.memory_bytes)
            );
            if metrics.memory_peak_bytes > 0 {
                memory.push_str(&format!(
                    " (peak: {})",
                    MetricsCollector::format_bytes(metrics.memory_peak_bytes)
                ));
            }
            let _ = writeln!(out, "  ├─ {memory}");
            let _ = writeln!(
                out,
                "  └─ FDs: {} | Restarts: {}",
                metrics.file_descriptors, status.restart_count
            );
        }
        ProcessState::Fatal => {
            let _ = writeln!(
                out,
                "{}: {state_str} (Last exit: {}, Restarts: {})",
                status.name, status.last_exit_status, status.restart_count
            );
            let _ = writeln!(out, "  └─ Process failed to start or crashed");
        }
        _ => {
            let _ = writeln!(out, "{}: {state_str}", status.name);
        }
    }
}

fn print_stats<W: Write>(statuses: &[InstanceStatus], out: &mut W) {
    let total = statuses.len();
    let count = |state: ProcessState| statuses.iter().filter(|s| s.state == state).count();
    let running = count(ProcessState::Running);
    let starting = count(ProcessState::Starting);
    let stopped = count(ProcessState::Stopped);
    let stopping = count(ProcessState::Stopping);
    let failed = count(ProcessState::Fatal);
    let exited = count(ProcessState::Exited);
    let backoff = count(ProcessState::Backoff);
    let total_restarts: u32 = statuses.iter().map(|s| s.restart_count).sum();

    let avg_uptime = if running > 0 {
        let sum: u64 = statuses
            .iter()
            .filter(|s| s.state == ProcessState::Running)
            .map(|s| s.uptime.as_secs())
            .sum();
        MetricsCollector::format_uptime(std::time::Duration::from_secs(sum / running as u64))
    } else {
        "0s".to_string()
    };

    let _ = writeln!(out, "\n{}", "Process Statistics:".bold());
    let _ = writeln!(out, "==========================================");
    let _ = writeln!(out, "Total Processes:     {total}");
    let mut running_line = format!("{}             {running}", "Running:".green());
    if starting > 0 {
        running_line.push_str(&format!(" (+{starting} starting)"));
    }
    let _ = writeln!(out, "{running_line}");
    let mut stopped_line = format!("{}             {stopped}", "Stopped:".yellow());
    if stopping > 0 {
        stopped_line.push_str(&format!(" (+{stopping} stopping)"));
    }
    let _ = writeln!(out, "{stopped_line}");
    if failed > 0 {
        let _ = writeln!(out, "{}              {failed}", "Failed:".red());
    }
    if exited > 0 {
        let _ = writeln!(out, "{}              {exited}", "Exited:".cyan());
    }
    if backoff > 0 {
        let _ = writeln!(out, "{}             {backoff}", "Backoff:".magenta());
    }
    let _ = writeln!(out, "Total Restarts:      {total_restarts}");
    let _ = writeln!(out, "Average Uptime:      {avg_uptime}");

    let health = if total > 0 {
        running as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let rendered = format!("{health:.1}%");
    let verdict = if health >= 80.0 {
        format!("{rendered} (EXCELLENT)").green()
    } else if health >= 60.0 {
        format!("{rendered} (GOOD)").yellow()
    } else if health >= 40.0 {
        format!("{rendered} (WARNING)").yellow()
    } else {
        format!("{rendered} (CRITICAL)").red()
    };
    let _ = writeln!(out, "System Health:       {verdict}");
}

fn color_state(state: ProcessState, text: &str) -> colored::ColoredString {
    match state {
        ProcessState::Running => text.green(),
        ProcessState::Stopped => text.yellow(),
        ProcessState::Fatal => text.red(),
        ProcessState::Starting => text.cyan(),
        ProcessState::Stopping => text.magenta(),
        ProcessState::Backoff => text.magenta(),
        ProcessState::Exited => text.cyan(),
    }
}

fn print_help<W: Write>(out: &mut W) {
    let _ = writeln!(out, "Available commands:");
    let _ = writeln!(out, "  status [name]            - Show status of all processes or a specific process");
    let _ = writeln!(out, "  status --detailed [name] - Show detailed status with CPU, memory, and metrics");
    let _ = writeln!(out, "  stats                    - Show process statistics and system health");
    let _ = writeln!(out, "  logs <name> [lines]      - Show process logs (default: 10 lines)");
    let _ = writeln!(out, "  start <name>             - Start a process");
    let _ = writeln!(out, "  stop <name>              - Stop a process");
    let _ = writeln!(out, "  restart <name>           - Restart a process");
    let _ = writeln!(out, "  reload                   - Reload configuration");
    let _ = writeln!(out, "  clear                    - Clear the terminal screen");
    let _ = writeln!(out, "  quit/exit                - Exit TaskMaster");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IniConfigSource;
    use std::io::Cursor;

    fn supervisor_with(config: &str) -> (tempfile::TempDir, Supervisor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskmaster.conf");
        std::fs::write(&path, config).unwrap();
        let sup = Supervisor::new(IniConfigSource::new(&path), Vec::new()).unwrap();
        (dir, sup)
    }

    fn run_commands(sup: &Supervisor, script: &str) -> String {
        let mut output = Vec::new();
        Shell::new(sup).run(Cursor::new(script.to_string()), &mut output);
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn unknown_command_keeps_the_loop_alive() {
        let (_dir, sup) = supervisor_with("[program:idle]\ncommand=/bin/sleep 30\nautostart=false\n");
        let out = run_commands(&sup, "bogus\nstatus\nquit\n");
        assert!(out.contains("Unknown command: bogus"));
        assert!(out.contains("idle: STOPPED"));
    }

    #[test]
    fn start_and_stop_report_results() {
        let (_dir, sup) = supervisor_with("[program:idle]\ncommand=/bin/sleep 30\nautostart=false\n");
        let out = run_commands(&sup, "start idle\nstop idle\nquit\n");
        assert!(out.contains("Started idle"));
        assert!(out.contains("Stopped idle"));
    }

    #[test]
    fn lifecycle_commands_require_a_name() {
        let (_dir, sup) = supervisor_with("[program:idle]\ncommand=/bin/sleep 30\nautostart=false\n");
        let out = run_commands(&sup, "start\nstop\nrestart\nquit\n");
        assert!(out.contains("Usage: start <program_name>"));
        assert!(out.contains("Usage: stop <program_name>"));
        assert!(out.contains("Usage: restart <program_name>"));
    }

    #[test]
    fn unknown_instance_fails_politely() {
        let (_dir, sup) = supervisor_with("[program:idle]\ncommand=/bin/sleep 30\nautostart=false\n");
        let out = run_commands(&sup, "start ghost\nstatus ghost\nquit\n");
        assert!(out.contains("Failed to start ghost"));
        assert!(out.contains("Process not found: ghost"));
    }

    #[test]
    fn eof_behaves_like_quit() {
        let (_dir, sup) = supervisor_with("[program:idle]\ncommand=/bin/sleep 30\nautostart=false\n");
        let out = run_commands(&sup, "status\n");
        assert!(out.contains("Process Status:"));
    }

    #[test]
    fn help_lists_all_commands() {
        let (_dir, sup) = supervisor_with("[program:idle]\ncommand=/bin/sleep 30\nautostart=false\n");
        let out = run_commands(&sup, "help\nquit\n");
        for needle in ["status", "stats", "logs", "start", "stop", "restart", "reload", "quit"] {
            assert!(out.contains(needle), "help should mention {needle}");
        }
    }
}
