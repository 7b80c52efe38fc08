//! # Event subscribers for the taskmaster runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling runtime events published through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Supervisor / monitor / Process ── publish(Event) ──► Bus
//!                                                         │
//!                                               SubscriberSet::emit()
//!                                                         │
//!                                    ┌────────────────────┼───────────────┐
//!                                    ▼                    ▼               ▼
//!                              [queue + worker]    [queue + worker]      ...
//!                                    ▼                    ▼
//!                                LogWriter          custom Subscribe
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use taskmaster::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! impl Subscribe for FailureCounter {
//!     fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::DiedUnexpectedly {
//!             // increment a counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

mod log;
mod set;
mod subscriber;

pub use log::{render, Level, LogWriter};
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
