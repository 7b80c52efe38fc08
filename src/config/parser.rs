//! # INI configuration source.
//!
//! Parses the supervisor's INI-style configuration file into a map of
//! [`ProgramConfig`] keyed by program name.
//!
//! ## Format
//! ```text
//! [program:web]
//! command=/usr/bin/python3 -m http.server
//! numprocs=2
//! autorestart=unexpected
//! exitcodes=0, 2
//! environment=PORT=8080,GREETING="hello world"
//! ```
//!
//! ## Rules
//! - Only `[program:<name>]` sections are consumed; other sections are kept
//!   but ignored.
//! - Unrecognized keys inside a program section warn and are ignored.
//! - A value that fails to parse warns and leaves the key at its default.
//! - A program without a `command` is skipped with a warning.
//! - Blank lines and lines starting with `;` or `#` are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::program::{instance_names, AutoRestart, AutoStart, ProgramConfig, StopSignal};
use crate::error::ConfigError;

/// Map of program name to parsed configuration.
pub type ProgramMap = BTreeMap<String, ProgramConfig>;

/// Source of program configurations.
///
/// The supervisor holds one of these and re-invokes [`ConfigSource::load`]
/// on every `reload` command. A load failure during reload leaves the
/// previously installed configuration in effect.
pub trait ConfigSource: Send {
    /// Parses the configuration and returns the program map.
    fn load(&self) -> Result<ProgramMap, ConfigError>;
}

/// [`ConfigSource`] reading an INI file from disk.
pub struct IniConfigSource {
    path: PathBuf,
}

impl IniConfigSource {
    /// Creates a source bound to the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for IniConfigSource {
    fn load(&self) -> Result<ProgramMap, ConfigError> {
        let path = self.path.display().to_string();
        let text = fs::read_to_string(&self.path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        parse_ini(&path, &text)
    }
}

/// Parses INI text into a program map. `path` is used for diagnostics only.
pub fn parse_ini(path: &str, text: &str) -> Result<ProgramMap, ConfigError> {
    let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(section.trim().to_string());
            sections.entry(section.trim().to_string()).or_default();
            continue;
        }
        let (Some((key, value)), Some(section)) = (line.split_once('='), current.as_deref())
        else {
            return Err(ConfigError::Syntax {
                path: path.to_string(),
                line: idx + 1,
                content: raw.to_string(),
            });
        };
        sections
            .entry(section.to_string())
            .or_default()
            .push((key.trim().to_string(), value.trim().to_string()));
    }

    let mut programs = ProgramMap::new();
    for (section, entries) in &sections {
        let Some(name) = section.strip_prefix("program:") else {
            continue;
        };
        if name.is_empty() {
            eprintln!("Warning: ignoring program section with empty name");
            continue;
        }
        if let Some(config) = parse_program_section(name, entries) {
            programs.insert(name.to_string(), config);
        }
    }
    Ok(programs)
}

/// Builds one [`ProgramConfig`] from a section's key/value pairs.
///
/// Returns `None` when the program has no command (skipped with a warning).
fn parse_program_section(name: &str, entries: &[(String, String)]) -> Option<ProgramConfig> {
    let mut config = ProgramConfig::new(name);

    for (key, value) in entries {
        match key.as_str() {
            "command" => config.command = value.clone(),
            "numprocs" => match value.parse::<u32>() {
                Ok(n) if n >= 1 => config.numprocs = n,
                _ => warn_value(name, key, value),
            },
            "priority" => parse_or_warn(name, key, value, &mut config.priority),
            "autostart" => config.autostart = AutoStart::parse(value),
            "autorestart" => config.autorestart = AutoRestart::parse(value),
            "autorestart_exit_codes" | "exitcodes" => {
                config.expected_exit_codes = parse_exit_codes(name, value);
            }
            "startretries" => parse_or_warn(name, key, value, &mut config.start_retries),
            "starttime" => parse_or_warn(name, key, value, &mut config.start_secs),
            "stopsignal" => match StopSignal::parse(value) {
                Some(sig) => config.stop_signal = sig,
                None => warn_value(name, key, value),
            },
            "stoptime" => parse_or_warn(name, key, value, &mut config.stop_secs),
            "stdout_logfile" => config.stdout_log = value.clone(),
            "stderr_logfile" => config.stderr_log = value.clone(),
            "directory" => config.workingdir = value.clone(),
            "environment" => config.environment = parse_environment(value),
            "umask" => match u32::from_str_radix(value, 8) {
                Ok(mask) => config.umask = mask,
                Err(_) => warn_value(name, key, value),
            },
            _ => {
                eprintln!("Warning: unknown key '{key}' in program {name}, ignoring");
            }
        }
    }

    if config.command.is_empty() {
        eprintln!("Warning: program {name} has no command specified");
        return None;
    }
    Some(config)
}

fn parse_or_warn<T: std::str::FromStr>(name: &str, key: &str, value: &str, slot: &mut T) {
    match value.parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn_value(name, key, value),
    }
}

fn warn_value(name: &str, key: &str, value: &str) {
    eprintln!("Warning: invalid value for {key} in program {name}: {value}");
}

/// Parses a comma-separated exit-code list, trimming whitespace around
/// commas. Unparsable entries warn and are skipped.
fn parse_exit_codes(name: &str, value: &str) -> Vec<i32> {
    let mut codes = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<i32>() {
            Ok(code) => codes.push(code),
            Err(_) => warn_value(name, "exitcodes", token),
        }
    }
    codes
}

/// Parses `K=V[,K=V…]`; values may be double-quoted, quotes are stripped.
fn parse_environment(value: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for token in value.split(',') {
        let token = token.trim();
        let Some((key, val)) = token.split_once('=') else {
            continue;
        };
        let val = val
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(val);
        env.insert(key.to_string(), val.to_string());
    }
    env
}

/// Expands a program map into the full set of instance names, in map order.
pub fn expand_instances(programs: &ProgramMap) -> Vec<(String, &ProgramConfig)> {
    let mut out = Vec::new();
    for (name, config) in programs {
        for instance in instance_names(name, config.numprocs) {
            out.push((instance, config));
        }
    }
    out
}
