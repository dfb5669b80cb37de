// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Signal-driven cancellation flags.
//!
//! Peers cancel each other's searches with `SIGUSR2`; the operator stops a
//! peer with `SIGINT`. Both handlers only flip process-local atomics:
//! `SIGUSR2` raises the search interrupt, `SIGINT` additionally raises the
//! shutdown flag so the main loop exits after the current round. Shared
//! state is never touched from a handler.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

/// Raised by `SIGUSR2` and `SIGINT`; polled by search workers, rearmed by
/// the round loop.
static SEARCH_INTERRUPT: AtomicBool = AtomicBool::new(false);
/// Raised by `SIGINT` only; checked by the round loop, never rearmed.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigusr2(_: libc::c_int) {
    SEARCH_INTERRUPT.store(true, Ordering::Relaxed);
}

extern "C" fn on_sigint(_: libc::c_int) {
    SEARCH_INTERRUPT.store(true, Ordering::Relaxed);
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Installs both handlers. Must run before the peer seats itself, so no
/// winner can signal an unprepared process.
pub fn install() -> nix::Result<()> {
    let usr2 = SigAction::new(
        SigHandler::Handler(on_sigusr2),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let int = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        sigaction(Signal::SIGUSR2, &usr2)?;
        sigaction(Signal::SIGINT, &int)?;
    }
    Ok(())
}

/// The search-interrupt flag fed by both handlers.
pub fn search_interrupt() -> &'static AtomicBool {
    &SEARCH_INTERRUPT
}

/// The shutdown flag fed by `SIGINT`.
pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN
}
