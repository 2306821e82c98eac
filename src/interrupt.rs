/*!
 * Interrupt handling
 *
 * A SIGINT flips a process-wide flag; the run loops poll it between entries
 * and stop at the next safe point. The handler body only touches an atomic,
 * which keeps it async-signal-safe.
 */

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Whether the user asked the run to stop.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(unix)]
extern "C" fn handle_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Installs the SIGINT handler. Call once at startup.
#[cfg(unix)]
pub fn install() {
    unsafe {
        libc::signal(
            libc::SIGINT,
            handle_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t,
        );
    }
}

/// Installs the SIGINT handler. Call once at startup.
#[cfg(not(unix))]
pub fn install() {}
