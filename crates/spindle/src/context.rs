// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide interrupt station and context.
//!
//! There is exactly one interrupt station per process. It owns the sigint
//! guard condition that every engine includes in its wait-set and the
//! condition variable that timed sleeps block on. Firing it, whether from
//! SIGINT or an explicit [`shutdown`], wakes every blocked wait and sleeper;
//! it is never reset.
//!
//! A [`Context`] owns the per-process collaborators that outlive individual
//! nodes, currently the intra-process manager. Most applications use
//! [`Context::global`].

use crate::intra_process::IntraProcessManager;
use crate::rmw::{self, GuardCondition};
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

struct InterruptStation {
    sigint_guard: Arc<GuardCondition>,
    interrupted: AtomicBool,
    handler_installed: AtomicBool,
    sleep_lock: Mutex<()>,
    sleep_condvar: Condvar,
}

fn station() -> &'static InterruptStation {
    static STATION: OnceLock<InterruptStation> = OnceLock::new();
    STATION.get_or_init(|| InterruptStation {
        sigint_guard: rmw::create_guard_condition(),
        interrupted: AtomicBool::new(false),
        handler_installed: AtomicBool::new(false),
        sleep_lock: Mutex::new(()),
        sleep_condvar: Condvar::new(),
    })
}

/// Initialize the process: install the SIGINT hook.
///
/// Idempotent with respect to the station itself; calling it twice is an
/// error because the signal hook can only be installed once.
///
/// # Errors
///
/// Returns [`Error::InitFailed`] when called twice or when the hook cannot
/// be installed.
pub fn init() -> Result<()> {
    let station = station();
    if station.handler_installed.swap(true, Ordering::AcqRel) {
        return Err(Error::InitFailed("init called twice".to_string()));
    }

    ctrlc::set_handler(|| {
        log::info!("[context] SIGINT received, shutting down");
        shutdown();
    })
    .map_err(|e| Error::InitFailed(format!("could not install SIGINT handler: {}", e)))
}

/// Initialize and strip middleware-specific arguments from `args`.
///
/// Arguments starting with `--rmw-` belong to the middleware layer and are
/// consumed; everything else is handed back to the caller in order.
pub fn init_with_args<I>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    init()?;
    Ok(args
        .into_iter()
        .filter(|arg| !arg.starts_with("--rmw-"))
        .collect())
}

/// True until the process is interrupted.
#[must_use]
pub fn ok() -> bool {
    !station().interrupted.load(Ordering::Acquire)
}

/// Interrupt the process, exactly as if SIGINT had been received.
///
/// Triggers the sigint guard (waking every engine blocked in a wait) and
/// notifies timed sleepers. Safe to call from any thread, any number of
/// times.
pub fn shutdown() {
    let station = station();
    station.interrupted.store(true, Ordering::Release);
    station.sigint_guard.trigger();
    let _lock = station.sleep_lock.lock();
    station.sleep_condvar.notify_all();
}

/// The guard condition fired on interrupt.
///
/// Every engine includes this in its wait-set so shutdown wakes it.
#[must_use]
pub fn sigint_guard() -> Arc<GuardCondition> {
    Arc::clone(&station().sigint_guard)
}

/// Sleep for `duration`, releasable by [`shutdown`].
///
/// Returns `true` when the full duration elapsed, `false` when woken by the
/// interrupt station. Spurious wakeups recompute the remaining time and
/// resume the wait.
pub fn sleep_for(duration: Duration) -> bool {
    let station = station();
    let deadline = Instant::now() + duration;

    let mut lock = station.sleep_lock.lock();
    loop {
        if station.interrupted.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let _ = station
            .sleep_condvar
            .wait_for(&mut lock, deadline - now);
    }
}

/// Per-process collaborators shared by all nodes created against it.
pub struct Context {
    intra_process_manager: Arc<IntraProcessManager>,
}

impl Context {
    /// Create a standalone context with its own intra-process manager.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            intra_process_manager: Arc::new(IntraProcessManager::new()),
        })
    }

    /// The default process-wide context.
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<Context>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(Context::new))
    }

    /// The intra-process manager owned by this context.
    #[must_use]
    pub fn intra_process_manager(&self) -> Arc<IntraProcessManager> {
        Arc::clone(&self.intra_process_manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // shutdown() is permanent for the whole process, so everything that
    // exercises it lives in the dedicated `tests/shutdown.rs` binary. Here we
    // only cover the pieces that do not fire the station.

    #[test]
    fn test_ok_before_any_shutdown() {
        assert!(ok());
    }

    #[test]
    fn test_sleep_for_elapses_when_not_interrupted() {
        let start = Instant::now();
        assert!(sleep_for(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_contexts_have_distinct_managers() {
        let a = Context::new();
        let b = Context::new();
        assert!(!Arc::ptr_eq(
            &a.intra_process_manager(),
            &b.intra_process_manager()
        ));
    }

    #[test]
    fn test_global_context_is_shared() {
        assert!(Arc::ptr_eq(
            &Context::global().intra_process_manager(),
            &Context::global().intra_process_manager()
        ));
    }
}
