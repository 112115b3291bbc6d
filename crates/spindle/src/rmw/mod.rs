// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loopback middleware layer.
//!
//! The layers above reach the middleware exclusively through this module:
//! opaque handle types, `create_*` factories, the wait primitive and the
//! take/send primitives. Nothing above this module touches delivery or
//! readiness directly.
//!
//! ```text
//! +--------------------------------------------------------------+
//! |        Node / entities / executor (client library)           |
//! +--------------------------------------------------------------+
//! |  rmw: create_* | wait(WaitSet) | take / take_request / ...   |
//! +--------------------------------------------------------------+
//! |  loopback transport: topic + rpc registries, signal wakeups  |
//! +--------------------------------------------------------------+
//! ```
//!
//! Handles are created through free functions so the contract stays narrow:
//! a replacement backed by a real networked middleware only has to provide
//! these entry points.

mod endpoints;
mod guard;
mod services;
mod timer;
mod topics;
mod waitset;

pub use endpoints::{Gid, MessageStorage, PublisherHandle, SubscriptionHandle};
pub use guard::GuardCondition;
pub use services::{ClientHandle, RequestId, ServiceHandle};
pub use timer::TimerHandle;
pub use waitset::{wait, WaitResult, WaitSet};

use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Create a guard condition.
#[must_use]
pub fn create_guard_condition() -> Arc<GuardCondition> {
    Arc::new(GuardCondition::new())
}

/// Create a publisher endpoint on `topic`.
#[must_use]
pub fn create_publisher(
    participant: u64,
    topic: &str,
    depth: usize,
    type_id: u32,
) -> Arc<PublisherHandle> {
    Arc::new(PublisherHandle::new(
        participant,
        topic.to_string(),
        depth,
        type_id,
    ))
}

/// Create a subscription endpoint on `topic` and register it for delivery.
#[must_use]
pub fn create_subscription(
    participant: u64,
    topic: &str,
    depth: usize,
    ignore_local: bool,
    type_id: u32,
) -> Arc<SubscriptionHandle> {
    let handle = Arc::new(SubscriptionHandle::new(
        participant,
        topic.to_string(),
        MessageStorage::with_depth(depth),
        ignore_local,
        type_id,
    ));
    topics::registry().register(&handle);
    handle
}

/// Create a service endpoint.
///
/// # Errors
///
/// Fails when another live service already owns `name`.
pub fn create_service(name: &str) -> Result<Arc<ServiceHandle>> {
    services::create_service_handle(name)
}

/// Create a client endpoint bound to the service named `name`.
///
/// The service does not have to exist yet; requests fail until it does.
#[must_use]
pub fn create_client(name: &str) -> Arc<ClientHandle> {
    services::create_client_handle(name)
}

/// Create a periodic timer handle.
#[must_use]
pub fn create_timer(period: Duration) -> Arc<TimerHandle> {
    Arc::new(TimerHandle::new(period))
}
