//! # Event publishing handle.
//!
//! [`Bus`] is the cheap-to-clone handle the supervisor, monitor, and
//! processes use to publish [`Event`]s to the subscriber set.
//!
//! ## Key characteristics:
//! - **Fire-and-forget**: `publish` never blocks the caller
//! - **Non-persistent**: an event reaches the subscribers attached at
//!   publish time, or nobody
//! - **Per-subscriber isolation**: a slow subscriber only overflows its own
//!   queue (see [`SubscriberSet`](crate::subscribers::SubscriberSet))
//!
//! Publishing happens on the thread that holds the supervisor lock, so for a
//! given instance events enter every subscriber queue in causal order.

use std::sync::Arc;

use crate::events::Event;
use crate::subscribers::SubscriberSet;

/// Handle for publishing runtime events to all subscribers.
#[derive(Clone)]
pub struct Bus {
    subs: Arc<SubscriberSet>,
}

impl Bus {
    /// Creates a bus over the given subscriber set.
    pub fn new(subs: SubscriberSet) -> Self {
        Self {
            subs: Arc::new(subs),
        }
    }

    /// Publishes an event to all subscribers (non-blocking).
    ///
    /// With no subscribers attached the event is dropped silently; the
    /// system operates fine without observers.
    pub fn publish(&self, ev: Event) {
        self.subs.emit(&ev);
    }
}
