// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rate: loop pacing over the interruptible timed sleep.

use crate::context;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Paces a loop to a fixed period.
///
/// [`Rate::sleep`] computes the next target instant and sleeps for the
/// remaining delta through [`context::sleep_for`], so a process shutdown
/// releases the sleeper early.
pub struct Rate {
    period: Duration,
    next: Mutex<Instant>,
}

impl Rate {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Mutex::new(Instant::now()),
        }
    }

    /// Rate firing `frequency` times per second.
    ///
    /// # Panics
    ///
    /// Panics when `frequency` is not a positive finite number.
    #[must_use]
    pub fn from_frequency(frequency: f64) -> Self {
        assert!(
            frequency.is_finite() && frequency > 0.0,
            "frequency must be positive"
        );
        Self::new(Duration::from_secs_f64(1.0 / frequency))
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next period boundary.
    ///
    /// Returns `true` when the boundary was reached (including when the loop
    /// is running behind and no sleep was needed), `false` when released
    /// early by shutdown. Falling behind re-anchors the schedule to now
    /// instead of bursting to catch up.
    pub fn sleep(&self) -> bool {
        let delay = {
            let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            *next += self.period;
            if *next <= now {
                *next = now;
                return true;
            }
            *next - now
        };
        context::sleep_for(delay)
    }

    /// Restart the schedule from now.
    pub fn reset(&self) {
        *self.next.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_paces_to_the_period() {
        let rate = Rate::new(Duration::from_millis(20));
        let start = Instant::now();
        assert!(rate.sleep());
        assert!(rate.sleep());
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn test_behind_schedule_does_not_sleep() {
        let rate = Rate::new(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        assert!(rate.sleep());
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_from_frequency() {
        let rate = Rate::from_frequency(50.0);
        assert_eq!(rate.period(), Duration::from_millis(20));
    }
}
