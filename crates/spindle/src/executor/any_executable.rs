// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The engine's dispatch record: exactly one ready unit of work.

use crate::callback_group::CallbackGroup;
use crate::client::ClientBase;
use crate::node::Node;
use crate::service::ServiceBase;
use crate::subscription::SubscriptionBase;
use crate::timer::WallTimer;
use std::sync::Arc;

/// One claimed, ready executable.
///
/// Created at selection, destroyed after the dispatch returns. Destruction
/// restores the owning group's takeability, so a mutually exclusive group
/// opens up again even when the user callback panicked out of the dispatch.
pub struct AnyExecutable {
    pub(crate) timer: Option<Arc<WallTimer>>,
    pub(crate) subscription: Option<Arc<dyn SubscriptionBase>>,
    /// Set when `subscription` was selected through its intra-process notice
    /// handle rather than the middleware data handle.
    pub(crate) intra_process: bool,
    pub(crate) service: Option<Arc<dyn ServiceBase>>,
    pub(crate) client: Option<Arc<dyn ClientBase>>,
    pub(crate) callback_group: Option<Arc<CallbackGroup>>,
    /// Keeps the owning node alive for the duration of the dispatch.
    pub(crate) node: Option<Arc<Node>>,
}

impl AnyExecutable {
    pub(crate) fn empty() -> Self {
        Self {
            timer: None,
            subscription: None,
            intra_process: false,
            service: None,
            client: None,
            callback_group: None,
            node: None,
        }
    }
}

impl Drop for AnyExecutable {
    fn drop(&mut self) {
        let _keep_alive = self.node.take();
        if let Some(group) = self.callback_group.take() {
            group.release();
        }
    }
}
