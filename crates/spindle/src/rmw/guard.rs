// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Guard condition: a manually triggered wait-set member.
//!
//! A guard condition carries no payload. Triggering it wakes every wait-set
//! it is attached to. The trigger value latches: it stays set until the
//! owner clears it, so a single trigger is observed by every concurrent
//! waiter, not just the first one to scan.

use crate::rmw::waitset::SignalList;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Manually triggered condition, usable from any thread.
pub struct GuardCondition {
    id: u64,
    trigger_value: AtomicBool,
    signals: SignalList,
}

impl GuardCondition {
    pub(crate) fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            trigger_value: AtomicBool::new(false),
            signals: SignalList::new(),
        }
    }

    /// Unique handle identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Set the trigger and wake every attached wait-set.
    pub fn trigger(&self) {
        self.trigger_value.store(true, Ordering::Release);
        self.signals.notify_all();
    }

    /// Read the trigger without clearing it.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.trigger_value.load(Ordering::Acquire)
    }

    /// Clear the trigger, reporting whether it was set. Called by the owner
    /// once the condition that was signalled has been served; the report
    /// lets the owner avoid blocking on a wake-up it just absorbed.
    pub fn clear(&self) -> bool {
        self.trigger_value.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn signals(&self) -> &SignalList {
        &self.signals
    }
}

impl std::fmt::Debug for GuardCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardCondition")
            .field("id", &self.id)
            .field("triggered", &self.is_triggered())
            .finish()
    }
}
