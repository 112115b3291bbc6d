// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher and subscription handles for the loopback middleware.
//!
//! Handles are opaque to the layers above: they expose creation, a take
//! primitive and readiness, nothing else. Delivery fans a shared, type-erased
//! message out to every matching subscription through the topic registry.
//!
//! Incoming messages are staged per subscription in a [`MessageStorage`]
//! bounded by the endpoint's history depth; the oldest staged message is
//! dropped on overflow.

use crate::message::SharedMessage;
use crate::rmw::waitset::SignalList;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Globally unique identity of a publisher endpoint.
///
/// Built from the owning participant id and the endpoint id; carried with
/// every delivered message so receivers can recognise local senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid([u8; 16]);

impl Gid {
    pub(crate) fn new(participant: u64, entity: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&participant.to_le_bytes());
        bytes[8..].copy_from_slice(&entity.to_le_bytes());
        Self(bytes)
    }

    /// Raw gid bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// A staged inbound message: payload plus the sender's identity.
pub(crate) struct IncomingMessage {
    pub payload: SharedMessage,
    pub sender: Gid,
}

/// Depth-bounded staging area for one subscription's inbound messages.
///
/// Overflow drops the oldest staged message, which matches keep-last history
/// with the configured depth.
pub struct MessageStorage {
    depth: usize,
    queue: Mutex<VecDeque<IncomingMessage>>,
}

impl MessageStorage {
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            queue: Mutex::new(VecDeque::with_capacity(depth)),
        }
    }

    /// Configured history depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn push(&self, message: IncomingMessage) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() == self.depth {
            queue.pop_front();
            log::debug!("[rmw] storage full (depth={}), dropped oldest", self.depth);
        }
        queue.push_back(message);
    }

    pub(crate) fn pop(&self) -> Option<IncomingMessage> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Owning handle for a publisher endpoint.
pub struct PublisherHandle {
    id: u64,
    topic: String,
    participant: u64,
    gid: Gid,
    type_id: u32,
    depth: usize,
}

impl PublisherHandle {
    pub(crate) fn new(participant: u64, topic: String, depth: usize, type_id: u32) -> Self {
        let id = next_endpoint_id();
        Self {
            id,
            gid: Gid::new(participant, id),
            topic,
            participant,
            type_id,
            depth,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Identity attached to every message sent through this handle.
    #[must_use]
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// History depth requested at creation.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Deliver `payload` to every matching subscription on this topic.
    pub fn publish(&self, payload: SharedMessage) {
        super::topics::registry().publish(
            &self.topic,
            payload,
            self.gid,
            self.participant,
            self.type_id,
        );
    }
}

/// Owning handle for a subscription endpoint.
pub struct SubscriptionHandle {
    id: u64,
    topic: String,
    participant: u64,
    ignore_local: bool,
    type_id: u32,
    storage: MessageStorage,
    signals: SignalList,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        participant: u64,
        topic: String,
        storage: MessageStorage,
        ignore_local: bool,
        type_id: u32,
    ) -> Self {
        Self {
            id: next_endpoint_id(),
            topic,
            participant,
            ignore_local,
            type_id,
            storage,
            signals: SignalList::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True when at least one message is staged.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.storage.len() > 0
    }

    pub(crate) fn participant(&self) -> u64 {
        self.participant
    }

    pub(crate) fn ignore_local(&self) -> bool {
        self.ignore_local
    }

    pub(crate) fn type_id(&self) -> u32 {
        self.type_id
    }

    pub(crate) fn signals(&self) -> &SignalList {
        &self.signals
    }

    pub(crate) fn deliver(&self, message: IncomingMessage) {
        self.storage.push(message);
        self.signals.notify_all();
    }

    /// Take the oldest staged message, if any.
    pub fn take(&self) -> Option<(SharedMessage, Gid)> {
        self.storage
            .pop()
            .map(|incoming| (incoming.payload, incoming.sender))
    }
}

fn next_endpoint_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
