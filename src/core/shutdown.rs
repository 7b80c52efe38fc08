//! # OS signal trampoline for supervisor shutdown.
//!
//! SIGINT and SIGTERM must not do real work in the handler: the handler
//! only stores the signal number in an atomic (async-signal-safe), and the
//! monitor thread observes it within one interval, stops every running
//! instance, and exits the process with the signal number.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

/// Signal number recorded by the handler; 0 means none pending.
static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn record_signal(signum: libc::c_int) {
    PENDING_SIGNAL.store(signum, Ordering::SeqCst);
}

/// Installs the SIGINT/SIGTERM handlers.
///
/// `SA_RESTART` keeps the shell's blocking stdin read intact; shutdown is
/// driven by the monitor thread, not by interrupting the reader.
pub fn register_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(record_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

/// Takes the pending signal number, if any. Clears the flag.
pub fn take_pending_signal() -> Option<i32> {
    match PENDING_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        signum => Some(signum),
    }
}
