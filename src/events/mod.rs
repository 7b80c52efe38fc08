//! Runtime events: types and publishing handle.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish runtime events emitted by the supervisor, the monitor sweep, and
//! the managed processes.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] cheap-to-clone publishing handle over the subscriber set
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor` (start/stop/reload/shutdown), the monitor
//!   sweeps (classification, restarts, fatal transitions), `Process`
//!   (reaps, force-kill escalation), `SubscriberSet` workers
//!   (overflow/panic).
//! - **Consumers**: every [`Subscribe`](crate::subscribers::Subscribe)
//!   implementation, e.g. the built-in
//!   [`LogWriter`](crate::subscribers::LogWriter).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
