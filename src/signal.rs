//! Signal handling: SIGHUP requests a logger reopen, SIGPIPE is ignored so a
//! client disconnecting mid-write can't kill the process. Grounded on
//! `skynet_start.c`'s `handle_hup`/`block_signal` via `nix::sys::signal`.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

/// Set once a `SIGHUP` has been delivered; the logger thread polls this and
/// clears it after reopening its output.
static HUP_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sighup(_: i32) {
    HUP_RECEIVED.store(true, Ordering::SeqCst);
}

/// Install the process-wide signal dispositions. Must run before any worker
/// threads are spawned, since signal dispositions are process-global.
///
/// # Safety
/// Installs a C signal handler; the handler body must stay async-signal-safe
/// (it only stores to an atomic, which it is).
pub unsafe fn install() -> Result<(), nix::errno::Errno> {
    signal::signal(Signal::SIGPIPE, SigHandler::SigIgn)?;
    signal::signal(Signal::SIGHUP, SigHandler::Handler(on_sighup))?;
    Ok(())
}

/// Returns `true` and clears the flag if a `SIGHUP` arrived since the last
/// call. Poll this from the logger's own loop rather than doing work in the
/// handler itself.
pub fn take_sighup() -> bool {
    HUP_RECEIVED.swap(false, Ordering::SeqCst)
}
