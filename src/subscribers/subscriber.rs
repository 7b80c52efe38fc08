//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] — the extension point for plugging custom event
//! handlers into the runtime.
//!
//! Each subscriber gets:
//! - **Dedicated worker thread** (runs independently)
//! - **Bounded queue** (configurable capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics caught, reported to stderr)
//!
//! ## Rules
//! - Slow subscribers only affect themselves (queue overflow → event drop)
//! - Panics are **isolated** (do not crash the runtime or other subscribers)
//! - Subscribers **do not block** publishers or other subscribers
//! - Queue capacity is **per-subscriber** (not global)

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// Receives events from the runtime via a dedicated worker thread with a
/// bounded queue.
///
/// ### Implementation requirements
/// - **Performance**: slow processing only backs up this subscriber's queue
/// - **Error handling**: handle errors internally, do not panic
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's worker thread, never from the publisher.
    /// Events arrive in queue (FIFO) order.
    fn on_event(&self, event: &Event);

    /// Returns the subscriber name for overflow/panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// When the queue is full, new events are dropped for this subscriber
    /// only and the drop is reported. Defaults to 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
