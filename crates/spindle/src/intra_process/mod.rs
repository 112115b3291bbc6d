// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Intra-process manager: serialization-free delivery inside one process.
//!
//! Publishers and subscriptions on the same topic register here when their
//! node enables intra-process comms. A publish stores the owned message in
//! the publisher's ring buffer and announces `(publisher_id, sequence)` on
//! the companion notice topic; a subscription that receives the notice claims
//! the stored message from the ring.
//!
//! Ownership rules at take time:
//! - exactly one effective taker: the stored message moves out of the ring
//!   and the taker receives the original allocation;
//! - several takers: each receives a shared view, and the entry is removed
//!   once the last pending taker has consumed it;
//! - entry already taken or evicted: the taker silently skips.
//!
//! The set of pending takers is captured when the message is stored, so
//! subscriptions added afterwards do not observe older messages.

mod mapped_ring_buffer;

pub use mapped_ring_buffer::MappedRingBuffer;

use crate::message::{OwnedMessage, SharedMessage, TypeDescriptor};
use crate::rmw::Gid;
use crate::subscription::SubscriptionBase;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Suffix of the companion topic carrying intra-process notices.
pub(crate) const NOTICE_TOPIC_SUFFIX: &str = "__intra";

/// Notice published on the companion topic when a message is stored.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IntraProcessNotice {
    pub publisher_id: u64,
    pub message_seq: u64,
}

/// A message claimed from the manager.
pub enum IntraProcessMessage {
    /// Sole taker: ownership of the stored allocation transfers.
    Owned(OwnedMessage),
    /// One of several takers: a shared view of the stored message.
    Shared(SharedMessage),
}

enum StoredMessage {
    Unique(OwnedMessage),
    Shared(SharedMessage),
}

struct PublisherRecord {
    topic: String,
    gid: Gid,
    descriptor: TypeDescriptor,
    buffer: MappedRingBuffer<StoredMessage>,
    /// seq -> subscription ids that have not taken the entry yet.
    pending: HashMap<u64, Vec<u64>>,
    sequence: u64,
}

struct SubscriptionRecord {
    topic: String,
    ignore_local: bool,
    descriptor: TypeDescriptor,
    subscription: Weak<dyn SubscriptionBase>,
}

#[derive(Default)]
struct IpmState {
    publishers: HashMap<u64, PublisherRecord>,
    subscriptions: HashMap<u64, SubscriptionRecord>,
}

/// Per-process registry pairing intra-process publishers and subscriptions.
pub struct IntraProcessManager {
    state: Mutex<IpmState>,
    next_publisher_id: AtomicU64,
    next_subscription_id: AtomicU64,
}

impl IntraProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IpmState::default()),
            next_publisher_id: AtomicU64::new(1),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    /// Register a publisher; allocates its ring buffer of `depth` slots.
    pub fn add_publisher(
        &self,
        topic: &str,
        gid: Gid,
        depth: usize,
        descriptor: TypeDescriptor,
    ) -> u64 {
        let id = self.next_publisher_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.publishers.insert(
            id,
            PublisherRecord {
                topic: topic.to_string(),
                gid,
                descriptor,
                buffer: MappedRingBuffer::with_capacity(depth.max(1)),
                pending: HashMap::new(),
                sequence: 0,
            },
        );
        log::debug!("[ipm] publisher {} registered on '{}'", id, topic);
        id
    }

    pub fn remove_publisher(&self, publisher_id: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.publishers.remove(&publisher_id);
    }

    /// Register a subscription on `topic`.
    pub fn add_subscription(
        &self,
        topic: &str,
        subscription: Weak<dyn SubscriptionBase>,
        ignore_local: bool,
        descriptor: TypeDescriptor,
    ) -> u64 {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.subscriptions.insert(
            id,
            SubscriptionRecord {
                topic: topic.to_string(),
                ignore_local,
                descriptor,
                subscription,
            },
        );
        log::debug!("[ipm] subscription {} registered on '{}'", id, topic);
        id
    }

    pub fn remove_subscription(&self, subscription_id: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = state.subscriptions.remove(&subscription_id) else {
            return;
        };
        // Purge the id from every pending set so later takers see a correct
        // remaining count.
        for publisher in state.publishers.values_mut() {
            if publisher.topic == record.topic {
                for pending in publisher.pending.values_mut() {
                    pending.retain(|id| *id != subscription_id);
                }
            }
        }
    }

    /// Store an owned message, assign it the next sequence number and return
    /// that sequence.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] when the message's declared type differs from
    /// the type registered for this publisher; [`Error::SendFailed`] when the
    /// publisher id is not registered.
    pub fn store_intra_process_message(
        &self,
        publisher_id: u64,
        message: OwnedMessage,
        descriptor: TypeDescriptor,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let takers = {
            let publisher = state.publishers.get(&publisher_id).ok_or_else(|| {
                Error::SendFailed(format!("publisher {} is not registered", publisher_id))
            })?;
            if publisher.descriptor.type_id != descriptor.type_id {
                return Err(Error::TypeMismatch {
                    expected: publisher.descriptor.type_name,
                    actual: descriptor.type_name,
                });
            }
            effective_takers(&state, &publisher.topic)
        };

        let publisher = state
            .publishers
            .get_mut(&publisher_id)
            .ok_or_else(|| Error::SendFailed(format!("publisher {} vanished", publisher_id)))?;

        publisher.sequence += 1;
        let seq = publisher.sequence;

        let stored = if takers.len() > 1 {
            StoredMessage::Shared(SharedMessage::from(message))
        } else {
            StoredMessage::Unique(message)
        };

        if let Some((evicted_seq, _)) = publisher.buffer.push_unique(seq, stored) {
            publisher.pending.remove(&evicted_seq);
            log::debug!(
                "[ipm] publisher {} evicted seq {} (depth {})",
                publisher_id,
                evicted_seq,
                publisher.buffer.capacity()
            );
        }
        publisher.pending.insert(seq, takers);

        Ok(seq)
    }

    /// Claim the message stored under `(publisher_id, seq)` on behalf of
    /// `subscription_id`.
    ///
    /// Returns `Ok(None)` when the entry was already taken or evicted, when
    /// the subscription is not among the entry's pending takers, or when the
    /// publisher is unknown (a notice from another process).
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] when the subscription's expected type differs
    /// from the publisher's stored type.
    pub fn take_intra_process_message(
        &self,
        publisher_id: u64,
        seq: u64,
        subscription_id: u64,
    ) -> Result<Option<IntraProcessMessage>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let expected = match state.subscriptions.get(&subscription_id) {
            Some(record) => record.descriptor,
            None => {
                log::debug!("[ipm] take from unregistered subscription {}", subscription_id);
                return Ok(None);
            }
        };

        let Some(publisher) = state.publishers.get_mut(&publisher_id) else {
            return Ok(None);
        };

        if publisher.descriptor.type_id != expected.type_id {
            return Err(Error::TypeMismatch {
                expected: expected.type_name,
                actual: publisher.descriptor.type_name,
            });
        }

        let Some(pending) = publisher.pending.get_mut(&seq) else {
            return Ok(None);
        };
        let Some(position) = pending.iter().position(|id| *id == subscription_id) else {
            return Ok(None);
        };

        pending.swap_remove(position);
        let drained = pending.is_empty();
        if drained {
            publisher.pending.remove(&seq);
            let Some(stored) = publisher.buffer.take_unique(seq) else {
                return Ok(None);
            };
            return Ok(Some(match stored {
                StoredMessage::Unique(message) => IntraProcessMessage::Owned(message),
                StoredMessage::Shared(message) => IntraProcessMessage::Shared(message),
            }));
        }

        match publisher.buffer.consume_shared(seq) {
            Some(StoredMessage::Shared(message)) => {
                Ok(Some(IntraProcessMessage::Shared(Arc::clone(message))))
            }
            Some(StoredMessage::Unique(_)) => {
                log::error!(
                    "[ipm] uniquely stored seq {} has several pending takers",
                    seq
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Whether `gid` belongs to any publisher registered here. Used to drop
    /// the inter-process duplicate of a message already delivered through
    /// the intra-process path.
    #[must_use]
    pub fn matches_any_publishers(&self, gid: &Gid) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .publishers
            .values()
            .any(|publisher| publisher.gid == *gid)
    }
}

impl Default for IntraProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription ids on `topic` that should receive the next stored message:
/// alive and not ignoring local publications.
fn effective_takers(state: &IpmState, topic: &str) -> Vec<u64> {
    state
        .subscriptions
        .iter()
        .filter(|(_, record)| {
            record.topic == topic
                && !record.ignore_local
                && record.subscription.upgrade().is_some()
        })
        .map(|(id, _)| *id)
        .collect()
}
