// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-threaded executor: a fixed worker pool over the shared engine.
//!
//! Every worker runs the same selection loop. Wait-set rebuilds are
//! serialized by the engine's state mutex; dispatches run outside it, so up
//! to `number_of_threads` callbacks execute concurrently. The callback
//! group's takeable flag is the only thing keeping mutually exclusive
//! groups single-file.

use super::Executor;
use crate::memory_strategy::MemoryStrategy;
use crate::node::Node;
use crate::{Error, Result};
use std::sync::Arc;
use std::thread;

/// Runs the selection loop on `number_of_threads` workers.
pub struct MultiThreadedExecutor {
    engine: Arc<Executor>,
    number_of_threads: usize,
}

impl MultiThreadedExecutor {
    /// Pool sized to the machine's available parallelism.
    #[must_use]
    pub fn new() -> Self {
        let threads = thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(2);
        Self::with_number_of_threads(threads)
    }

    #[must_use]
    pub fn with_number_of_threads(number_of_threads: usize) -> Self {
        Self {
            engine: Arc::new(Executor::new()),
            number_of_threads: number_of_threads.max(1),
        }
    }

    #[must_use]
    pub fn number_of_threads(&self) -> usize {
        self.number_of_threads
    }

    pub fn add_node(&self, node: &Arc<Node>, notify: bool) {
        self.engine.add_node(node, notify);
    }

    pub fn remove_node(&self, node: &Arc<Node>, notify: bool) {
        self.engine.remove_node(node, notify);
    }

    pub fn set_memory_strategy(&self, memory_strategy: Box<dyn MemoryStrategy>) {
        self.engine.set_memory_strategy(memory_strategy);
    }

    /// Spin the worker pool until shutdown or [`MultiThreadedExecutor::cancel`].
    ///
    /// A panic in a user callback ends that worker's spin; the panic is
    /// resurfaced on the calling thread after the remaining workers drain.
    pub fn spin(&self) -> Result<()> {
        self.engine.reset_cancel();
        let mut workers = Vec::with_capacity(self.number_of_threads);
        for index in 0..self.number_of_threads {
            let engine = Arc::clone(&self.engine);
            let worker = thread::Builder::new()
                .name(format!("spindle-worker-{}", index))
                .spawn(move || engine.spin_worker())
                .map_err(|e| Error::WaitFailed(format!("could not spawn worker: {}", e)))?;
            workers.push(worker);
        }

        let mut first_error = None;
        let mut panic_payload = None;
        for worker in workers {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    // A failed worker leaves the others spinning; stop them.
                    self.engine.cancel();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(payload) => {
                    self.engine.cancel();
                    if panic_payload.is_none() {
                        panic_payload = Some(payload);
                    }
                }
            }
        }

        if let Some(payload) = panic_payload {
            std::panic::resume_unwind(payload);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Dispatch everything currently ready on the calling thread.
    pub fn spin_some(&self) -> Result<()> {
        self.engine.spin_some()
    }

    /// Stop every worker without shutting the process down.
    pub fn cancel(&self) {
        self.engine.cancel();
    }
}

impl Default for MultiThreadedExecutor {
    fn default() -> Self {
        Self::new()
    }
}
