// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wait-and-dispatch engine.
//!
//! The engine turns middleware readiness into user callback invocations:
//!
//! 1. flatten every attached node's entities into the wait-set, together
//!    with the process sigint guard, the engine's own interrupt guard and
//!    one guard per node;
//! 2. block in the middleware wait, bounded by the earliest timer deadline;
//! 3. clear everything the middleware did not mark ready;
//! 4. pick one executable: expired timers first, then subscriptions (the
//!    intra-process notice ahead of the data handle for the same topic),
//!    then services, then clients, honoring callback-group takeability;
//! 5. claim the group (compare-and-swap for mutually exclusive groups),
//!    dispatch, and restore takeability when the dispatch record drops.
//!
//! The rebuild in step 1 runs under the engine's state mutex, so only one
//! thread reshapes the wait-set at a time; the blocking wait itself runs
//! unlocked so other workers keep selecting and admin calls (`add_node`,
//! `cancel`) never wedge behind a sleeping wait.

mod any_executable;
mod multi_threaded;
mod single_threaded;

pub use any_executable::AnyExecutable;
pub use multi_threaded::MultiThreadedExecutor;
pub use single_threaded::SingleThreadedExecutor;

use crate::callback_group::CallbackGroup;
use crate::client::ClientBase;
use crate::context;
use crate::memory_strategy::{DefaultMemoryStrategy, MemoryStrategy};
use crate::node::Node;
use crate::rmw;
use crate::service::ServiceBase;
use crate::subscription::SubscriptionBase;
use crate::timer::WallTimer;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

struct SubscriptionRecord {
    subscription: Arc<dyn SubscriptionBase>,
    /// The handle this record waits on: the data handle, or the notice
    /// handle for the intra-process record of the same subscription.
    handle: Arc<rmw::SubscriptionHandle>,
    intra_process: bool,
    group: Arc<CallbackGroup>,
    node: Arc<Node>,
    ready: bool,
}

struct ServiceRecord {
    service: Arc<dyn ServiceBase>,
    group: Arc<CallbackGroup>,
    node: Arc<Node>,
    ready: bool,
}

struct ClientRecord {
    client: Arc<dyn ClientBase>,
    group: Arc<CallbackGroup>,
    node: Arc<Node>,
    ready: bool,
}

struct TimerRecord {
    timer: Arc<WallTimer>,
    group: Arc<CallbackGroup>,
    node: Arc<Node>,
}

/// Flattened per-iteration view of the attached nodes.
#[derive(Default)]
struct EngineState {
    weak_nodes: Vec<Weak<Node>>,
    subscriptions: Vec<SubscriptionRecord>,
    services: Vec<ServiceRecord>,
    clients: Vec<ClientRecord>,
    timers: Vec<TimerRecord>,
}

impl EngineState {
    fn new() -> Self {
        Self::default()
    }
}

/// Shared wait-and-dispatch engine.
///
/// [`SingleThreadedExecutor`] runs its loop on the calling thread;
/// [`MultiThreadedExecutor`] runs the same loop on a worker pool. All
/// engine state is interior, so one engine can be driven from several
/// threads.
pub struct Executor {
    interrupt_guard: Arc<rmw::GuardCondition>,
    canceled: AtomicBool,
    state: Mutex<EngineState>,
    memory_strategy: Mutex<Box<dyn MemoryStrategy>>,
}

impl Executor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_memory_strategy(Box::new(DefaultMemoryStrategy::new()))
    }

    #[must_use]
    pub fn with_memory_strategy(memory_strategy: Box<dyn MemoryStrategy>) -> Self {
        Self {
            interrupt_guard: rmw::create_guard_condition(),
            canceled: AtomicBool::new(false),
            state: Mutex::new(EngineState::new()),
            memory_strategy: Mutex::new(memory_strategy),
        }
    }

    /// Attach a node. With `notify`, an in-progress wait wakes up and
    /// rebuilds its set so the node's entities are served immediately.
    pub fn add_node(&self, node: &Arc<Node>, notify: bool) {
        if notify {
            // Unwedge a wait that may be holding readiness we are about to
            // change.
            self.interrupt_guard.trigger();
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let already_attached = state
            .weak_nodes
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|n| Arc::ptr_eq(&n, node)));
        if !already_attached {
            state.weak_nodes.push(Arc::downgrade(node));
        }
        drop(state);
        if notify {
            self.interrupt_guard.trigger();
        }
    }

    /// Detach a node. With `notify`, a wait blocked on the old set wakes up;
    /// removing the last node would otherwise leave it blocked forever.
    pub fn remove_node(&self, node: &Arc<Node>, notify: bool) {
        if notify {
            self.interrupt_guard.trigger();
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .weak_nodes
            .retain(|weak| weak.upgrade().is_some_and(|n| !Arc::ptr_eq(&n, node)));
        // The flattened records may still reference the detached node; drop
        // them so the fast path cannot dispatch its entities.
        state.subscriptions.clear();
        state.services.clear();
        state.clients.clear();
        state.timers.clear();
        drop(state);
        if notify {
            self.interrupt_guard.trigger();
        }
    }

    /// Swap the memory strategy. Only defined at quiescent points; swapping
    /// while a wait is outstanding forfeits that iteration's scratch reuse.
    pub fn set_memory_strategy(&self, memory_strategy: Box<dyn MemoryStrategy>) {
        *self
            .memory_strategy
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = memory_strategy;
    }

    /// Stop this engine's spin loops without touching the process-wide
    /// interrupt station. In-flight dispatches run to completion.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.interrupt_guard.trigger();
    }

    fn canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn spinning(&self) -> bool {
        context::ok() && !self.canceled()
    }

    /// Clear a previous [`Executor::cancel`] so the engine can spin again.
    pub(crate) fn reset_cancel(&self) {
        self.canceled.store(false, Ordering::Release);
    }

    /// Run the selection loop on the calling thread until shutdown or
    /// [`Executor::cancel`].
    pub fn spin(&self) -> Result<()> {
        self.reset_cancel();
        self.spin_worker()
    }

    /// The selection loop itself, without clearing a pending cancel. Worker
    /// pools clear once and then run this on every thread.
    pub(crate) fn spin_worker(&self) -> Result<()> {
        while self.spinning() {
            match self.get_next_executable(None)? {
                Some(executable) => self.execute_any_executable(executable)?,
                // Woken without claimable work (admin guard, or every ready
                // group is busy). Give admin callers a chance at the lock.
                None => std::thread::yield_now(),
            }
        }
        Ok(())
    }

    /// Dispatch everything that is ready right now, without blocking.
    pub fn spin_some(&self) -> Result<()> {
        while self.spinning() {
            self.wait_for_work(Some(Duration::ZERO))?;
            let executable = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                self.get_next_ready_executable(&mut state)
            };
            match executable {
                Some(executable) => self.execute_any_executable(executable)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Attach `node`, dispatch at most one executable, detach `node`.
    ///
    /// `timeout == None` blocks until work arrives; `Some(ZERO)` polls.
    pub fn spin_node_once(&self, node: &Arc<Node>, timeout: Option<Duration>) -> Result<()> {
        self.add_node(node, true);
        let result = match self.get_next_executable(timeout) {
            Ok(Some(executable)) => self.execute_any_executable(executable),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        self.remove_node(node, true);
        result
    }

    /// Attach `node`, dispatch everything currently ready, detach `node`.
    pub fn spin_node_some(&self, node: &Arc<Node>) -> Result<()> {
        self.add_node(node, true);
        let result = self.spin_some();
        self.remove_node(node, true);
        result
    }

    /// Block until one executable can be claimed, the timeout expires, or
    /// the engine is interrupted.
    ///
    /// Guard wake-ups (admin changes, other workers' claims) produce empty
    /// rounds; the loop keeps waiting until the deadline so callers see the
    /// timeout they asked for, not the engine's internal wake cadence.
    pub fn get_next_executable(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<AnyExecutable>> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(executable) = self.get_next_ready_executable(&mut state) {
                return Ok(Some(executable));
            }
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if !self.spinning() {
                return Ok(None);
            }

            let remaining = deadline.map(|deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            self.wait_for_work(remaining)?;

            {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(executable) = self.get_next_ready_executable(&mut state) {
                    return Ok(Some(executable));
                }
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }

            // Ready-but-unclaimable batches would otherwise spin hot here.
            std::thread::yield_now();
        }
    }

    /// Dispatch one claimed executable. Take failures are logged and the
    /// executable is released; anything else propagates.
    pub fn execute_any_executable(&self, executable: AnyExecutable) -> Result<()> {
        let outcome = if let Some(timer) = &executable.timer {
            timer.execute();
            Ok(())
        } else if let Some(subscription) = &executable.subscription {
            if executable.intra_process {
                subscription.execute_intra_process()
            } else {
                subscription.execute_inter_process()
            }
        } else if let Some(service) = &executable.service {
            service.execute()
        } else if let Some(client) = &executable.client {
            client.execute()
        } else {
            Ok(())
        };

        // `executable` drops here, restoring the group's takeability even
        // when the outcome is an error.
        match outcome {
            Err(Error::TakeFailed { entity, reason }) => {
                log::error!("[executor] take from {} failed: {}", entity, reason);
                Ok(())
            }
            other => other,
        }
    }

    /// Rebuild the flattened entity records and block in the middleware wait.
    ///
    /// The rebuild runs under the state mutex; the blocking wait does not,
    /// so concurrent workers and admin calls stay live.
    fn wait_for_work(&self, timeout: Option<Duration>) -> Result<()> {
        let (mut wait_set, timer_bound, admin_pending) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            // This rebuild serves any pending admin wake-up: clear the
            // latched triggers before snapshotting. A trigger absorbed here
            // may carry a cancel or topology change, so this round must not
            // block.
            let mut admin_pending = self.interrupt_guard.clear();
            for weak in &state.weak_nodes {
                if let Some(node) = weak.upgrade() {
                    admin_pending |= node.notify_guard().clear();
                }
            }
            self.prepare_records(&mut state);

            let mut wait_set = self
                .memory_strategy
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .borrow_wait_set();

            wait_set
                .guard_conditions
                .push(Some(context::sigint_guard()));
            wait_set
                .guard_conditions
                .push(Some(Arc::clone(&self.interrupt_guard)));
            for weak in &state.weak_nodes {
                if let Some(node) = weak.upgrade() {
                    wait_set.guard_conditions.push(Some(node.notify_guard()));
                }
            }
            for record in &state.subscriptions {
                wait_set.subscriptions.push(Some(Arc::clone(&record.handle)));
            }
            for record in &state.services {
                wait_set
                    .services
                    .push(Some(Arc::clone(record.service.handle())));
            }
            for record in &state.clients {
                wait_set
                    .clients
                    .push(Some(Arc::clone(record.client.handle())));
            }

            let now = Instant::now();
            let timer_bound = state
                .timers
                .iter()
                .filter_map(|record| record.timer.next_deadline())
                .map(|deadline| deadline.saturating_duration_since(now))
                .min();

            (wait_set, timer_bound, admin_pending)
        };

        let effective_timeout = if admin_pending {
            Some(Duration::ZERO)
        } else {
            match (timeout, timer_bound) {
                (Some(timeout), Some(bound)) => Some(timeout.min(bound)),
                (Some(timeout), None) => Some(timeout),
                (None, Some(bound)) => Some(bound),
                (None, None) => None,
            }
        };

        rmw::wait(&mut wait_set, effective_timeout)?;

        let mut ready_handles: HashSet<u64> = HashSet::new();
        for slot in wait_set.subscriptions.iter().flatten() {
            ready_handles.insert(slot.id());
        }
        let ready_services: HashSet<u64> = wait_set
            .services
            .iter()
            .flatten()
            .map(|handle| handle.id())
            .collect();
        let ready_clients: HashSet<u64> = wait_set
            .clients
            .iter()
            .flatten()
            .map(|handle| handle.id())
            .collect();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for record in &mut state.subscriptions {
            if ready_handles.contains(&record.handle.id()) {
                record.ready = true;
            }
        }
        for record in &mut state.services {
            if ready_services.contains(&record.service.handle().id()) {
                record.ready = true;
            }
        }
        for record in &mut state.clients {
            if ready_clients.contains(&record.client.handle().id()) {
                record.ready = true;
            }
        }

        self.memory_strategy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .return_wait_set(wait_set);
        Ok(())
    }

    /// Flatten the attached nodes into per-kind records, dropping nodes that
    /// no longer exist. Intra-process records precede the data record of the
    /// same subscription so notices win when both are ready.
    fn prepare_records(&self, state: &mut EngineState) {
        state.subscriptions.clear();
        state.services.clear();
        state.clients.clear();
        state.timers.clear();
        state.weak_nodes.retain(|weak| weak.upgrade().is_some());

        let nodes: Vec<Arc<Node>> = state
            .weak_nodes
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        for node in nodes {
            for group in node.callback_groups() {
                for subscription in group.subscriptions() {
                    if let Some(notice_handle) = subscription.intra_handle() {
                        state.subscriptions.push(SubscriptionRecord {
                            subscription: Arc::clone(&subscription),
                            handle: notice_handle,
                            intra_process: true,
                            group: Arc::clone(&group),
                            node: Arc::clone(&node),
                            ready: false,
                        });
                    }
                    state.subscriptions.push(SubscriptionRecord {
                        handle: Arc::clone(subscription.handle()),
                        subscription,
                        intra_process: false,
                        group: Arc::clone(&group),
                        node: Arc::clone(&node),
                        ready: false,
                    });
                }
                for timer in group.timers() {
                    state.timers.push(TimerRecord {
                        timer,
                        group: Arc::clone(&group),
                        node: Arc::clone(&node),
                    });
                }
                for service in group.services() {
                    state.services.push(ServiceRecord {
                        service,
                        group: Arc::clone(&group),
                        node: Arc::clone(&node),
                        ready: false,
                    });
                }
                for client in group.clients() {
                    state.clients.push(ClientRecord {
                        client,
                        group: Arc::clone(&group),
                        node: Arc::clone(&node),
                        ready: false,
                    });
                }
            }
        }
    }

    /// Pick and claim one executable out of the current ready batch:
    /// timers, then subscriptions, then services, then clients.
    fn get_next_ready_executable(&self, state: &mut EngineState) -> Option<AnyExecutable> {
        // Most overdue timer first; stable sort keeps insertion order on ties.
        let mut expired: Vec<(usize, Instant)> = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, record)| record.timer.is_ready())
            .filter_map(|(index, record)| {
                record.timer.next_deadline().map(|deadline| (index, deadline))
            })
            .collect();
        expired.sort_by_key(|(_, deadline)| *deadline);

        for (index, _) in expired {
            let record = &state.timers[index];
            if record.group.try_claim() {
                let mut executable = AnyExecutable::empty();
                executable.timer = Some(Arc::clone(&record.timer));
                executable.callback_group = Some(Arc::clone(&record.group));
                executable.node = Some(Arc::clone(&record.node));
                return Some(executable);
            }
        }

        for record in &mut state.subscriptions {
            if record.ready && record.group.try_claim() {
                record.ready = false;
                let mut executable = AnyExecutable::empty();
                executable.subscription = Some(Arc::clone(&record.subscription));
                executable.intra_process = record.intra_process;
                executable.callback_group = Some(Arc::clone(&record.group));
                executable.node = Some(Arc::clone(&record.node));
                return Some(executable);
            }
        }

        for record in &mut state.services {
            if record.ready && record.group.try_claim() {
                record.ready = false;
                let mut executable = AnyExecutable::empty();
                executable.service = Some(Arc::clone(&record.service));
                executable.callback_group = Some(Arc::clone(&record.group));
                executable.node = Some(Arc::clone(&record.node));
                return Some(executable);
            }
        }

        for record in &mut state.clients {
            if record.ready && record.group.try_claim() {
                record.ready = false;
                let mut executable = AnyExecutable::empty();
                executable.client = Some(Arc::clone(&record.client));
                executable.callback_group = Some(Arc::clone(&record.group));
                executable.node = Some(Arc::clone(&record.node));
                return Some(executable);
            }
        }

        None
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a single-threaded executor, attach `node` and spin until shutdown.
pub fn spin(node: &Arc<Node>) -> Result<()> {
    let executor = SingleThreadedExecutor::new();
    executor.add_node(node, true);
    executor.spin()
}
