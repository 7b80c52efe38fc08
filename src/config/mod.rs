//! Program configuration: data model and INI source.
//!
//! ## Contents
//! - [`ProgramConfig`], [`AutoStart`], [`AutoRestart`], [`StopSignal`]
//!   declarative description of one program and its tri-state policies
//! - [`ConfigSource`], [`IniConfigSource`] the parsing seam the supervisor
//!   re-invokes on every reload
//! - [`instance_names`] / [`base_name`] instance-name expansion and its
//!   inverse, shared with the reconcile diff

mod parser;
mod program;

pub use parser::{expand_instances, parse_ini, ConfigSource, IniConfigSource, ProgramMap};
pub use program::{base_name, instance_names, AutoRestart, AutoStart, ProgramConfig, StopSignal};
