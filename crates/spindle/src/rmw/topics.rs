// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-global topic registry.
//!
//! Maps topic names to the subscriptions currently attached to them.
//! Subscriptions are held weakly so a dropped endpoint disappears from the
//! registry without explicit deregistration; dead entries are pruned whenever
//! the topic is touched.

use crate::message::SharedMessage;
use crate::rmw::endpoints::{Gid, IncomingMessage, SubscriptionHandle};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, Weak};

pub(crate) struct TopicRegistry {
    topics: RwLock<HashMap<String, Vec<Weak<SubscriptionHandle>>>>,
}

pub(crate) fn registry() -> &'static TopicRegistry {
    static REGISTRY: OnceLock<TopicRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| TopicRegistry {
        topics: RwLock::new(HashMap::new()),
    })
}

impl TopicRegistry {
    pub(crate) fn register(&self, subscription: &Arc<SubscriptionHandle>) {
        let mut topics = self.topics.write().unwrap_or_else(|e| e.into_inner());
        let entries = topics
            .entry(subscription.topic().to_string())
            .or_default();
        entries.retain(|weak| weak.upgrade().is_some());
        entries.push(Arc::downgrade(subscription));
    }

    /// Fan `payload` out to every live subscription on `topic`.
    ///
    /// Skips subscriptions with a mismatched message type (logged once per
    /// delivery attempt) and same-participant subscriptions that asked to
    /// ignore local publications.
    pub(crate) fn publish(
        &self,
        topic: &str,
        payload: SharedMessage,
        sender: Gid,
        sender_participant: u64,
        type_id: u32,
    ) {
        let receivers: Vec<Arc<SubscriptionHandle>> = {
            let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
            match topics.get(topic) {
                Some(entries) => entries.iter().filter_map(Weak::upgrade).collect(),
                None => return,
            }
        };

        for subscription in receivers {
            if subscription.ignore_local() && subscription.participant() == sender_participant {
                continue;
            }
            if subscription.type_id() != type_id {
                log::warn!(
                    "[rmw] type mismatch on '{}': subscription {} skipped",
                    topic,
                    subscription.id()
                );
                continue;
            }
            subscription.deliver(IncomingMessage {
                payload: Arc::clone(&payload),
                sender,
            });
        }
    }
}
