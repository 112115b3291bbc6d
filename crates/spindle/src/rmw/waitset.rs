// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wait-set: blocking readiness detection over middleware handles.
//!
//! A [`WaitSet`] holds one slot vector per handle kind. [`wait`] blocks until
//! at least one attached handle is ready, the timeout expires or a guard
//! condition fires. On return, ready entries are left set and all other
//! entries are cleared; that is the only mechanism callers use to detect
//! readiness.
//!
//! Blocking is signal driven. Every handle keeps a pruned list of weak wakers
//! and notifies them when its state flips to ready, so a blocked `wait` wakes
//! immediately instead of polling.

use crate::rmw::endpoints::SubscriptionHandle;
use crate::rmw::guard::GuardCondition;
use crate::rmw::services::{ClientHandle, ServiceHandle};
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Receiver side of a readiness notification.
///
/// Handles signal every registered waiter when they become ready.
pub(crate) trait WaitSignal: Send + Sync {
    /// Wake the waiter.
    fn signal(&self);

    /// Unique identifier, used to deduplicate registrations.
    fn id(&self) -> u64;
}

struct SignalHook {
    id: u64,
    signal: Weak<dyn WaitSignal>,
}

/// Pruned list of weak waiter registrations, shared by all handle kinds.
#[derive(Default)]
pub(crate) struct SignalList {
    hooks: Mutex<Vec<SignalHook>>,
}

impl SignalList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a waiter. Dead registrations are pruned on the way in.
    pub(crate) fn attach(&self, signal: &Arc<dyn WaitSignal>) {
        let mut hooks = self.hooks.lock();
        hooks.retain(|hook| hook.signal.upgrade().is_some());
        if hooks.iter().any(|hook| hook.id == signal.id()) {
            return;
        }
        hooks.push(SignalHook {
            id: signal.id(),
            signal: Arc::downgrade(signal),
        });
    }

    /// Notify every live waiter, dropping the dead ones.
    pub(crate) fn notify_all(&self) {
        let mut hooks = self.hooks.lock();
        hooks.retain(|hook| {
            if let Some(signal) = hook.signal.upgrade() {
                signal.signal();
                true
            } else {
                false
            }
        });
    }
}

/// Condvar-backed waiter used by [`wait`].
struct WaitNotifier {
    id: u64,
    ready: AtomicBool,
    sleeping: Mutex<bool>,
    condvar: Condvar,
}

impl WaitNotifier {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            ready: AtomicBool::new(false),
            sleeping: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Sleep until signalled or until `timeout` elapses.
    ///
    /// Returns `true` when signalled.
    fn wait_timeout(&self, timeout: Option<Duration>) -> bool {
        if self.ready.swap(false, Ordering::Acquire) {
            return true;
        }

        let mut sleeping = self.sleeping.lock();
        if self.ready.swap(false, Ordering::Acquire) {
            return true;
        }

        *sleeping = true;
        match timeout {
            Some(timeout) => {
                let _ = self.condvar.wait_for(&mut sleeping, timeout);
            }
            None => self.condvar.wait(&mut sleeping),
        }
        *sleeping = false;

        self.ready.swap(false, Ordering::Acquire)
    }
}

impl WaitSignal for WaitNotifier {
    fn signal(&self) {
        self.ready.store(true, Ordering::Release);
        let sleeping = self.sleeping.lock();
        if *sleeping {
            self.condvar.notify_all();
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

/// Outcome of a [`wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// At least one entry is ready (guard conditions included).
    Ready,
    /// The timeout expired with nothing ready.
    Timeout,
}

/// One slot vector per handle kind. `Some` entries are attached; after
/// [`wait`] returns, `Some` means ready.
#[derive(Default)]
pub struct WaitSet {
    pub subscriptions: Vec<Option<Arc<SubscriptionHandle>>>,
    pub services: Vec<Option<Arc<ServiceHandle>>>,
    pub clients: Vec<Option<Arc<ClientHandle>>>,
    pub guard_conditions: Vec<Option<Arc<GuardCondition>>>,
}

impl WaitSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entries, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.services.clear();
        self.clients.clear();
        self.guard_conditions.clear();
    }

    fn attach_all(&self, signal: &Arc<dyn WaitSignal>) {
        for sub in self.subscriptions.iter().flatten() {
            sub.signals().attach(signal);
        }
        for service in self.services.iter().flatten() {
            service.signals().attach(signal);
        }
        for client in self.clients.iter().flatten() {
            client.signals().attach(signal);
        }
        for guard in self.guard_conditions.iter().flatten() {
            guard.signals().attach(signal);
        }
    }

    /// Scan for readiness. When anything is ready, clear every non-ready
    /// entry and report `true`. Guard triggers are read without clearing;
    /// their owners reset them once the signalled condition is served.
    fn compact_if_ready(&mut self) -> bool {
        let mut any_ready = false;

        let sub_ready: Vec<bool> = self
            .subscriptions
            .iter()
            .map(|slot| slot.as_ref().is_some_and(|sub| sub.is_ready()))
            .collect();
        let service_ready: Vec<bool> = self
            .services
            .iter()
            .map(|slot| slot.as_ref().is_some_and(|service| service.is_ready()))
            .collect();
        let client_ready: Vec<bool> = self
            .clients
            .iter()
            .map(|slot| slot.as_ref().is_some_and(|client| client.is_ready()))
            .collect();
        let guard_ready: Vec<bool> = self
            .guard_conditions
            .iter()
            .map(|slot| slot.as_ref().is_some_and(|guard| guard.is_triggered()))
            .collect();

        any_ready |= sub_ready.iter().any(|ready| *ready);
        any_ready |= service_ready.iter().any(|ready| *ready);
        any_ready |= client_ready.iter().any(|ready| *ready);
        any_ready |= guard_ready.iter().any(|ready| *ready);

        if !any_ready {
            return false;
        }

        clear_not_ready(&mut self.subscriptions, &sub_ready);
        clear_not_ready(&mut self.services, &service_ready);
        clear_not_ready(&mut self.clients, &client_ready);
        clear_not_ready(&mut self.guard_conditions, &guard_ready);
        true
    }

    fn clear_all_entries(&mut self) {
        for slot in &mut self.subscriptions {
            *slot = None;
        }
        for slot in &mut self.services {
            *slot = None;
        }
        for slot in &mut self.clients {
            *slot = None;
        }
        for slot in &mut self.guard_conditions {
            *slot = None;
        }
    }
}

fn clear_not_ready<T>(slots: &mut [Option<T>], ready: &[bool]) {
    for (slot, ready) in slots.iter_mut().zip(ready) {
        if !*ready {
            *slot = None;
        }
    }
}

/// Block until at least one entry of `set` is ready or `timeout` expires.
///
/// `timeout == None` blocks indefinitely (until readiness or a guard fires).
/// `timeout == Some(ZERO)` polls without blocking.
///
/// # Errors
///
/// Returns [`Error::WaitFailed`] if the waiter could not be registered.
pub fn wait(set: &mut WaitSet, timeout: Option<Duration>) -> Result<WaitResult> {
    let notifier = Arc::new(WaitNotifier::new());
    let signal: Arc<dyn WaitSignal> = notifier.clone();
    set.attach_all(&signal);

    let deadline = match timeout {
        Some(timeout) => Some(
            Instant::now()
                .checked_add(timeout)
                .ok_or_else(|| Error::WaitFailed("timeout overflows the clock".to_string()))?,
        ),
        None => None,
    };

    loop {
        if set.compact_if_ready() {
            return Ok(WaitResult::Ready);
        }

        let remaining = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    set.clear_all_entries();
                    return Ok(WaitResult::Timeout);
                }
                Some(deadline - now)
            }
            None => None,
        };

        notifier.wait_timeout(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rmw;
    use std::thread;

    #[test]
    fn test_wait_timeout_clears_entries() {
        let guard = rmw::create_guard_condition();
        let mut set = WaitSet::new();
        set.guard_conditions.push(Some(guard));

        let start = Instant::now();
        let result = wait(&mut set, Some(Duration::from_millis(50))).expect("wait");
        assert_eq!(result, WaitResult::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(set.guard_conditions[0].is_none());
    }

    #[test]
    fn test_wait_returns_on_pretriggered_guard() {
        let guard = rmw::create_guard_condition();
        guard.trigger();

        let mut set = WaitSet::new();
        set.guard_conditions.push(Some(Arc::clone(&guard)));

        let result = wait(&mut set, Some(Duration::from_secs(1))).expect("wait");
        assert_eq!(result, WaitResult::Ready);
        assert!(set.guard_conditions[0].is_some());
        // The trigger latches; only the owner clears it.
        assert!(guard.is_triggered());
    }

    #[test]
    fn test_wait_wakes_on_async_trigger() {
        let guard = rmw::create_guard_condition();
        let mut set = WaitSet::new();
        set.guard_conditions.push(Some(Arc::clone(&guard)));

        let trigger_guard = Arc::clone(&guard);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            trigger_guard.trigger();
        });

        let start = Instant::now();
        let result = wait(&mut set, Some(Duration::from_secs(2))).expect("wait");
        assert_eq!(result, WaitResult::Ready);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_only_ready_entries_survive() {
        let triggered = rmw::create_guard_condition();
        let idle = rmw::create_guard_condition();
        triggered.trigger();

        let mut set = WaitSet::new();
        set.guard_conditions.push(Some(idle));
        set.guard_conditions.push(Some(triggered));

        wait(&mut set, Some(Duration::from_millis(100))).expect("wait");
        assert!(set.guard_conditions[0].is_none());
        assert!(set.guard_conditions[1].is_some());
    }
}
