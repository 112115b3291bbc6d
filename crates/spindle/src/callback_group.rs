// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callback groups: concurrency buckets for entity callbacks.
//!
//! A group is either mutually exclusive (at most one of its callbacks in
//! dispatch at any instant, across all engine threads) or reentrant (no
//! restriction). The engine enforces mutual exclusion through the group's
//! atomic `can_be_taken_from` flag: it is compare-and-swapped from true to
//! false when an executable is claimed and restored when the dispatch record
//! is destroyed.
//!
//! Groups hold subscriptions and timers weakly, so those entities can be
//! dropped independently, and services and clients strongly, since nothing
//! else typically keeps them alive. A group never owns its node.

use crate::client::ClientBase;
use crate::service::ServiceBase;
use crate::subscription::SubscriptionBase;
use crate::timer::WallTimer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Concurrency discipline of a callback group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackGroupType {
    MutuallyExclusive,
    Reentrant,
}

/// A named concurrency bucket of entities.
pub struct CallbackGroup {
    group_type: CallbackGroupType,
    can_be_taken_from: AtomicBool,
    subscriptions: Mutex<Vec<Weak<dyn SubscriptionBase>>>,
    timers: Mutex<Vec<Weak<WallTimer>>>,
    services: Mutex<Vec<Arc<dyn ServiceBase>>>,
    clients: Mutex<Vec<Arc<dyn ClientBase>>>,
}

impl CallbackGroup {
    #[must_use]
    pub fn new(group_type: CallbackGroupType) -> Self {
        Self {
            group_type,
            can_be_taken_from: AtomicBool::new(true),
            subscriptions: Mutex::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
            services: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn group_type(&self) -> CallbackGroupType {
        self.group_type
    }

    /// True when no executable from this group is currently in dispatch.
    #[must_use]
    pub fn can_be_taken_from(&self) -> bool {
        self.can_be_taken_from.load(Ordering::Acquire)
    }

    /// Claim the group for one dispatch.
    ///
    /// For mutually exclusive groups this flips `can_be_taken_from` from true
    /// to false; a lost race means some other thread claimed it first.
    /// Reentrant groups always succeed without touching the flag.
    pub(crate) fn try_claim(&self) -> bool {
        match self.group_type {
            CallbackGroupType::MutuallyExclusive => self
                .can_be_taken_from
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
            CallbackGroupType::Reentrant => true,
        }
    }

    /// Restore takeability after a dispatch. No-op for reentrant groups.
    pub(crate) fn release(&self) {
        if self.group_type == CallbackGroupType::MutuallyExclusive {
            self.can_be_taken_from.store(true, Ordering::Release);
        }
    }

    pub(crate) fn add_subscription(&self, subscription: &Arc<dyn SubscriptionBase>) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscriptions.retain(|weak| weak.upgrade().is_some());
        subscriptions.push(Arc::downgrade(subscription));
    }

    pub(crate) fn add_timer(&self, timer: &Arc<WallTimer>) {
        let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        timers.retain(|weak| weak.upgrade().is_some());
        timers.push(Arc::downgrade(timer));
    }

    pub(crate) fn add_service(&self, service: Arc<dyn ServiceBase>) {
        self.services
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(service);
    }

    pub(crate) fn add_client(&self, client: Arc<dyn ClientBase>) {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(client);
    }

    /// Live subscriptions currently in this group.
    pub(crate) fn subscriptions(&self) -> Vec<Arc<dyn SubscriptionBase>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Live timers currently in this group.
    pub(crate) fn timers(&self) -> Vec<Arc<WallTimer>> {
        self.timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn services(&self) -> Vec<Arc<dyn ServiceBase>> {
        self.services
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn clients(&self) -> Vec<Arc<dyn ClientBase>> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutually_exclusive_claim_is_exclusive() {
        let group = CallbackGroup::new(CallbackGroupType::MutuallyExclusive);
        assert!(group.can_be_taken_from());
        assert!(group.try_claim());
        assert!(!group.can_be_taken_from());
        assert!(!group.try_claim());

        group.release();
        assert!(group.can_be_taken_from());
        assert!(group.try_claim());
    }

    #[test]
    fn test_reentrant_claim_never_blocks() {
        let group = CallbackGroup::new(CallbackGroupType::Reentrant);
        assert!(group.try_claim());
        assert!(group.try_claim());
        assert!(group.can_be_taken_from());
        group.release();
        assert!(group.can_be_taken_from());
    }
}
