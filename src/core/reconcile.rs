//! # Configuration reconciliation: pure hot-reload diff.
//!
//! Maps a freshly parsed program map onto the currently installed instance
//! map, producing an ordered action list:
//!
//! 1. **Removal pass** — instances whose program vanished from the new
//!    configuration (matched through [`base_name`]), plus indexed instances
//!    beyond a shrunken `numprocs`, are removed first.
//! 2. **Addition / update pass** — every program expands into its instance
//!    names; unknown names are added, names whose effective configuration
//!    changed are replaced, everything else is kept untouched (preserving
//!    pid, uptime, and the retry counter).
//!
//! ## Effective-change predicate
//! Two configurations are the same iff these fields are equal: `command`,
//! `autostart`, `autorestart`, `expected_exit_codes`, `start_retries`,
//! `start_secs`, `stop_signal`, `stop_secs`, `stdout_log`, `stderr_log`,
//! `workingdir`, `environment`, `umask`. `name`, `priority`, and `numprocs`
//! are deliberately outside the predicate (`numprocs` is consumed by the
//! expansion itself).

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{base_name, instance_names, ProgramConfig, ProgramMap};

/// One reconciliation step, to be applied in order by the supervisor.
#[derive(Debug, Clone)]
pub enum ReconcileAction {
    /// Stop (when running) and delete the instance.
    Remove {
        /// Instance to delete.
        instance: String,
    },
    /// Construct a new instance; start it when `autostart` says so.
    Add {
        /// Instance to create.
        instance: String,
        /// Its configuration snapshot.
        config: ProgramConfig,
    },
    /// Tear down the instance and respawn it under the new configuration.
    Replace {
        /// Instance to respawn.
        instance: String,
        /// The changed configuration.
        config: ProgramConfig,
    },
    /// Leave the existing instance untouched.
    Keep {
        /// Instance that stays as-is.
        instance: String,
    },
}

/// Computes the ordered action list mapping `current` onto `fresh`.
///
/// `current` is the installed view: instance name → the config snapshot that
/// instance currently runs under. `fresh` is the newly parsed program map.
pub fn diff(current: &BTreeMap<String, ProgramConfig>, fresh: &ProgramMap) -> Vec<ReconcileAction> {
    let mut actions = Vec::new();

    let expanded: BTreeSet<String> = fresh
        .iter()
        .flat_map(|(name, config)| instance_names(name, config.numprocs))
        .collect();

    for instance in current.keys() {
        let program_dropped = !fresh.contains_key(base_name(instance));
        let index_dropped = !expanded.contains(instance);
        if program_dropped || index_dropped {
            actions.push(ReconcileAction::Remove {
                instance: instance.clone(),
            });
        }
    }

    for (name, config) in fresh {
        for instance in instance_names(name, config.numprocs) {
            match current.get(&instance) {
                None => actions.push(ReconcileAction::Add {
                    instance,
                    config: config.clone(),
                }),
                Some(old) if effective_config_changed(old, config) => {
                    actions.push(ReconcileAction::Replace {
                        instance,
                        config: config.clone(),
                    });
                }
                Some(_) => actions.push(ReconcileAction::Keep { instance }),
            }
        }
    }

    actions
}

/// True when the two configurations differ in any field that requires
/// tearing down and respawning the instance.
pub fn effective_config_changed(old: &ProgramConfig, new: &ProgramConfig) -> bool {
    old.command != new.command
        || old.autostart != new.autostart
        || old.autorestart != new.autorestart
        || old.expected_exit_codes != new.expected_exit_codes
        || old.start_retries != new.start_retries
        || old.start_secs != new.start_secs
        || old.stop_signal != new.stop_signal
        || old.stop_secs != new.stop_secs
        || old.stdout_log != new.stdout_log
        || old.stderr_log != new.stderr_log
        || old.workingdir != new.workingdir
        || old.environment != new.environment
        || old.umask != new.umask
}
