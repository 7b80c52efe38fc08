//! Binary entry point: CLI parsing, signal registration, supervisor run.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use taskmaster::{
    register_signal_handlers, IniConfigSource, LogWriter, Subscribe, Supervisor,
};

/// Process supervisor with declarative configs, bounded restarts, and hot
/// reload.
#[derive(Parser, Debug)]
#[command(name = "taskmaster", version, about)]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(default_value = "taskmaster.conf")]
    config: PathBuf,

    /// Path of the supervisor event log.
    #[arg(long, default_value = "taskmaster.log")]
    log_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = register_signal_handlers() {
        eprintln!("Error: failed to install signal handlers: {err}");
        std::process::exit(1);
    }

    let mut subscribers: Vec<Arc<dyn Subscribe>> = Vec::new();
    match LogWriter::open(&cli.log_file) {
        Ok(writer) => subscribers.push(Arc::new(writer)),
        Err(err) => eprintln!(
            "Warning: could not open log file {}: {err}",
            cli.log_file.display()
        ),
    }

    let supervisor = match Supervisor::new(IniConfigSource::new(&cli.config), subscribers) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    println!(
        "TaskMaster initialized with {} total processes.",
        supervisor.instance_count()
    );

    let stdin = io::stdin();
    supervisor.run(stdin.lock(), io::stdout());
}
