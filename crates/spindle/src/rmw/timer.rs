// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timer handle: periodic deadlines without wait-set membership.
//!
//! Timers are never attached to a wait-set. The engine asks each timer how
//! long until its next deadline, bounds its blocking wait by the minimum and
//! checks expiry after waking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Owning handle for a periodic timer.
pub struct TimerHandle {
    id: u64,
    period: Duration,
    last_trigger: Mutex<Instant>,
    canceled: AtomicBool,
}

impl TimerHandle {
    pub(crate) fn new(period: Duration) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            period,
            last_trigger: Mutex::new(Instant::now()),
            canceled: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Next deadline, or `None` once canceled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_canceled() {
            return None;
        }
        let last = *self.last_trigger.lock().unwrap_or_else(|e| e.into_inner());
        Some(last + self.period)
    }

    /// Time left until the next deadline; zero when already expired.
    #[must_use]
    pub fn time_until_trigger(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// True when the deadline has passed and the timer is not canceled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.time_until_trigger(), Some(left) if left.is_zero())
    }

    /// Advance the trigger time past `now`, skipping whole missed periods so
    /// a stalled engine does not fire a burst of catch-up callbacks.
    pub(crate) fn rearm(&self) {
        let mut last = self.last_trigger.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        while *last + self.period <= now {
            *last += self.period;
        }
    }

    /// Restart the period from now.
    pub fn reset(&self) {
        *self.last_trigger.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        self.canceled.store(false, Ordering::Release);
    }

    /// Stop the timer. A canceled timer never becomes ready again until
    /// [`TimerHandle::reset`].
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_timer_is_not_ready() {
        let timer = TimerHandle::new(Duration::from_secs(60));
        assert!(!timer.is_ready());
        let left = timer.time_until_trigger().expect("active timer");
        assert!(left > Duration::from_secs(59));
    }

    #[test]
    fn test_timer_becomes_ready_after_period() {
        let timer = TimerHandle::new(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert!(timer.is_ready());
    }

    #[test]
    fn test_rearm_skips_missed_periods() {
        let timer = TimerHandle::new(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(26));
        assert!(timer.is_ready());

        timer.rearm();
        assert!(!timer.is_ready());
        let left = timer.time_until_trigger().expect("active timer");
        assert!(left <= Duration::from_millis(5));
    }

    #[test]
    fn test_canceled_timer_never_fires() {
        let timer = TimerHandle::new(Duration::from_millis(1));
        timer.cancel();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!timer.is_ready());
        assert!(timer.next_deadline().is_none());

        timer.reset();
        assert!(!timer.is_canceled());
    }
}
