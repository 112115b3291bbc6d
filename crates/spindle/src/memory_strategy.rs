// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable scratch storage for the engine's wait-sets.
//!
//! The engine rebuilds its wait-set on every iteration. The memory strategy
//! owns the slot vectors between iterations so their capacity is recycled
//! instead of reallocated. Swapping the strategy is only defined at quiescent
//! points: between waits, never during a dispatch.
//!
//! Per-subscription staging of incoming messages is configured separately,
//! at subscription creation, through [`crate::rmw::MessageStorage`].

use crate::rmw::WaitSet;

/// Scratch-storage supplier queried by the engine once per iteration.
pub trait MemoryStrategy: Send {
    /// Hand out a cleared wait-set, reusing previously returned capacity.
    fn borrow_wait_set(&mut self) -> WaitSet;

    /// Give the wait-set back after the iteration; its capacity is kept for
    /// the next borrow.
    fn return_wait_set(&mut self, wait_set: WaitSet);
}

/// Default strategy: one recycled wait-set.
#[derive(Default)]
pub struct DefaultMemoryStrategy {
    scratch: Option<WaitSet>,
}

impl DefaultMemoryStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStrategy for DefaultMemoryStrategy {
    fn borrow_wait_set(&mut self) -> WaitSet {
        self.scratch.take().unwrap_or_default()
    }

    fn return_wait_set(&mut self, mut wait_set: WaitSet) {
        wait_set.clear();
        self.scratch = Some(wait_set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_recycles_capacity() {
        let mut strategy = DefaultMemoryStrategy::new();

        let mut wait_set = strategy.borrow_wait_set();
        wait_set.subscriptions.reserve(64);
        let capacity = wait_set.subscriptions.capacity();
        strategy.return_wait_set(wait_set);

        let recycled = strategy.borrow_wait_set();
        assert!(recycled.subscriptions.is_empty());
        assert!(recycled.subscriptions.capacity() >= capacity);
    }

    #[test]
    fn test_borrow_twice_without_return() {
        let mut strategy = DefaultMemoryStrategy::new();
        let first = strategy.borrow_wait_set();
        let second = strategy.borrow_wait_set();
        assert!(second.subscriptions.is_empty());
        drop(first);
    }
}
