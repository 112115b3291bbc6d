// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-threaded executor: the default execution model.

use super::Executor;
use crate::memory_strategy::MemoryStrategy;
use crate::node::Node;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Runs the selection loop and every user callback serially on the calling
/// thread.
pub struct SingleThreadedExecutor {
    engine: Executor,
}

impl SingleThreadedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: Executor::new(),
        }
    }

    #[must_use]
    pub fn with_memory_strategy(memory_strategy: Box<dyn MemoryStrategy>) -> Self {
        Self {
            engine: Executor::with_memory_strategy(memory_strategy),
        }
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

    /// Block until work comes in, execute it, and keep blocking. Returns on
    /// process shutdown or [`SingleThreadedExecutor::cancel`].
    pub fn spin(&self) -> Result<()> {
        self.engine.spin()
    }

    /// Dispatch everything currently ready without blocking.
    pub fn spin_some(&self) -> Result<()> {
        self.engine.spin_some()
    }

    /// Attach `node`, dispatch at most one executable, detach `node`.
    pub fn spin_node_once(&self, node: &Arc<Node>, timeout: Option<Duration>) -> Result<()> {
        self.engine.spin_node_once(node, timeout)
    }

    /// Attach `node`, dispatch everything currently ready, detach `node`.
    pub fn spin_node_some(&self, node: &Arc<Node>) -> Result<()> {
        self.engine.spin_node_some(node)
    }

    /// Stop an in-progress spin without shutting the process down.
    pub fn cancel(&self) {
        self.engine.cancel();
    }
}

impl Default for SingleThreadedExecutor {
    fn default() -> Self {
        Self::new()
    }
}
