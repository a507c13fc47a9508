//! Shared session flags.
//!
//! One `Session` is shared by the lifecycle manager and the two loops. The
//! flags follow a single-writer discipline: the lifecycle manager sets them
//! on the way up, and whichever loop first observes a failure clears them
//! through [`Session::begin_shutdown`]. Loops only ever read them at
//! iteration boundaries — termination is cooperative, never preemptive.

use std::sync::atomic::{AtomicBool, Ordering};

/// Connection-scoped flags shared across the inbound and outbound loops.
#[derive(Debug, Default)]
pub struct Session {
    connected: AtomicBool,
    logged_in: AtomicBool,
    shutting_down: AtomicBool,
}

impl Session {
    /// Fresh session with all flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream established and limits record received.
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Handshake reached `LoggedIn`.
    pub fn mark_logged_in(&self) {
        self.logged_in.store(true, Ordering::Release);
    }

    /// Whether the transport is (still) considered up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether the session is (still) logged in. Loop-continuation condition
    /// for both loops.
    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    /// Clear the flags and claim the shutdown.
    ///
    /// Returns `true` for exactly one caller per session; every exit path
    /// funnels through this so the transport close runs once no matter which
    /// loop (or the lifecycle manager) observed the failure first.
    pub fn begin_shutdown(&self) -> bool {
        self.connected.store(false, Ordering::Release);
        self.logged_in.store(false, Ordering::Release);
        !self.shutting_down.swap(true, Ordering::AcqRel)
    }
}
