//! SIGINT/SIGTERM handling.
//!
//! The handler only flips an atomic flag; the pipeline polls it between
//! phases and aborts through the normal error path, so teardown always runs
//! exactly once.

use anyhow::Result;
use nix::sys::signal::{self, SigHandler, Signal};
use pibake_error::BakeError;
use std::sync::atomic::{AtomicBool, Ordering};

static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: libc::c_int) {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install the signal handler once, at process start.
pub fn install_handler() -> Result<()> {
    let handler = SigHandler::Handler(handle_signal);
    unsafe {
        signal::signal(Signal::SIGINT, handler)?;
        signal::signal(Signal::SIGTERM, handler)?;
    }
    Ok(())
}

pub fn cancel_requested() -> bool {
    CANCEL_REQUESTED.load(Ordering::SeqCst)
}

/// Abort the run if an interrupt arrived since the last check.
pub fn check_cancel() -> Result<()> {
    if cancel_requested() {
        return Err(BakeError::Aborted.into());
    }
    Ok(())
}

#[cfg(test)]
pub fn reset_for_tests() {
    CANCEL_REQUESTED.store(false, Ordering::SeqCst);
}
