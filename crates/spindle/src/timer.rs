// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wall-clock timers.

use crate::rmw;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Periodic timer owning its middleware handle and user callback.
pub struct WallTimer {
    handle: Arc<rmw::TimerHandle>,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl WallTimer {
    pub(crate) fn new(handle: Arc<rmw::TimerHandle>, callback: Box<dyn Fn() + Send + Sync>) -> Self {
        Self { handle, callback }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.handle.period()
    }

    /// Next deadline, or `None` once canceled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.handle.next_deadline()
    }

    /// Time left until the next deadline; zero when already expired.
    #[must_use]
    pub fn time_until_trigger(&self) -> Option<Duration> {
        self.handle.time_until_trigger()
    }

    /// True when the deadline has passed and the timer is not canceled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.handle.is_ready()
    }

    /// Stop the timer until [`WallTimer::reset`].
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Restart the period from now.
    pub fn reset(&self) {
        self.handle.reset();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.handle.is_canceled()
    }

    /// Rearm, then run the user callback.
    ///
    /// Rearming first keeps the cadence anchored to the deadline rather than
    /// to how long the callback runs.
    pub(crate) fn execute(&self) {
        self.handle.rearm();
        (self.callback)();
    }
}
