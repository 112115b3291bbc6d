// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription entities.
//!
//! [`Subscription<T>`] owns a middleware handle and the user callback. The
//! engine reaches subscriptions through the type-erased [`SubscriptionBase`],
//! which exposes the handles for wait-set membership and the two dispatch
//! paths (inter-process take and intra-process notice).

use crate::intra_process::{IntraProcessManager, IntraProcessMessage, IntraProcessNotice};
use crate::message::Message;
use crate::rmw;
use crate::{Error, Result};
use std::sync::{Arc, OnceLock, Weak};

/// Type-erased subscription interface used by the engine.
pub trait SubscriptionBase: Send + Sync {
    /// Topic this subscription listens on.
    fn topic(&self) -> &str;

    /// Middleware handle carrying inter-process messages.
    fn handle(&self) -> &Arc<rmw::SubscriptionHandle>;

    /// Companion handle carrying intra-process notices, when enabled.
    fn intra_handle(&self) -> Option<Arc<rmw::SubscriptionHandle>>;

    /// Take one inter-process message and run the user callback.
    fn execute_inter_process(&self) -> Result<()>;

    /// Take one intra-process notice, claim the stored message and run the
    /// user callback.
    fn execute_intra_process(&self) -> Result<()>;
}

/// The two callback shapes a subscription can be created with.
pub(crate) enum SubscriptionCallback<T> {
    /// Callback receiving the message by value.
    Value(Box<dyn Fn(T) + Send + Sync>),
    /// Callback receiving the boxed message; on the sole-taker intra-process
    /// path this is the publisher's original allocation.
    Boxed(Box<dyn Fn(Box<T>) + Send + Sync>),
}

struct IntraProcessSetup {
    subscription_id: u64,
    notice_handle: Arc<rmw::SubscriptionHandle>,
    manager: Weak<IntraProcessManager>,
}

/// A typed subscription bound to one topic.
pub struct Subscription<T: Message + Clone> {
    handle: Arc<rmw::SubscriptionHandle>,
    topic: String,
    callback: SubscriptionCallback<T>,
    intra: OnceLock<IntraProcessSetup>,
}

impl<T: Message + Clone> Subscription<T> {
    pub(crate) fn new(
        handle: Arc<rmw::SubscriptionHandle>,
        topic: String,
        callback: SubscriptionCallback<T>,
    ) -> Self {
        Self {
            handle,
            topic,
            callback,
            intra: OnceLock::new(),
        }
    }

    /// Wire this subscription into the intra-process manager. Called once by
    /// the node right after creation.
    pub(crate) fn setup_intra_process(
        &self,
        subscription_id: u64,
        notice_handle: Arc<rmw::SubscriptionHandle>,
        manager: Weak<IntraProcessManager>,
    ) {
        let setup = IntraProcessSetup {
            subscription_id,
            notice_handle,
            manager,
        };
        if self.intra.set(setup).is_err() {
            log::error!("[subscription] intra-process setup ran twice on '{}'", self.topic);
        }
    }

    fn dispatch_value(&self, message: T) {
        match &self.callback {
            SubscriptionCallback::Value(callback) => callback(message),
            SubscriptionCallback::Boxed(callback) => callback(Box::new(message)),
        }
    }

    fn dispatch_boxed(&self, message: Box<T>) {
        match &self.callback {
            SubscriptionCallback::Value(callback) => callback(*message),
            SubscriptionCallback::Boxed(callback) => callback(message),
        }
    }
}

impl<T: Message + Clone> SubscriptionBase for Subscription<T> {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn handle(&self) -> &Arc<rmw::SubscriptionHandle> {
        &self.handle
    }

    fn intra_handle(&self) -> Option<Arc<rmw::SubscriptionHandle>> {
        self.intra.get().map(|setup| Arc::clone(&setup.notice_handle))
    }

    fn execute_inter_process(&self) -> Result<()> {
        let Some((payload, sender)) = self.handle.take() else {
            return Ok(());
        };

        if let Some(setup) = self.intra.get() {
            let manager = setup.manager.upgrade().ok_or(Error::ManagerDestroyed)?;
            if manager.matches_any_publishers(&sender) {
                // Already delivered (or deliberately withheld) through the
                // intra-process path.
                log::debug!("[subscription] dropped local duplicate on '{}'", self.topic);
                return Ok(());
            }
        }

        let message = payload.downcast::<T>().map_err(|_| Error::TakeFailed {
            entity: "subscription",
            reason: format!("unexpected payload type on '{}'", self.topic),
        })?;
        self.dispatch_value((*message).clone());
        Ok(())
    }

    fn execute_intra_process(&self) -> Result<()> {
        let Some(setup) = self.intra.get() else {
            return Ok(());
        };
        let Some((payload, _)) = setup.notice_handle.take() else {
            return Ok(());
        };

        let notice = payload
            .downcast::<IntraProcessNotice>()
            .map_err(|_| Error::TakeFailed {
                entity: "subscription",
                reason: format!("malformed intra-process notice on '{}'", self.topic),
            })?;
        let manager = setup.manager.upgrade().ok_or(Error::ManagerDestroyed)?;

        let claimed = manager.take_intra_process_message(
            notice.publisher_id,
            notice.message_seq,
            setup.subscription_id,
        )?;

        match claimed {
            None => Ok(()),
            Some(IntraProcessMessage::Owned(owned)) => {
                let message = owned.downcast::<T>().map_err(|_| Error::TakeFailed {
                    entity: "subscription",
                    reason: format!("stored message type changed on '{}'", self.topic),
                })?;
                self.dispatch_boxed(message);
                Ok(())
            }
            Some(IntraProcessMessage::Shared(shared)) => {
                let message = shared.downcast::<T>().map_err(|_| Error::TakeFailed {
                    entity: "subscription",
                    reason: format!("stored message type changed on '{}'", self.topic),
                })?;
                self.dispatch_value((*message).clone());
                Ok(())
            }
        }
    }
}

impl<T: Message + Clone> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(setup) = self.intra.get() {
            if let Some(manager) = setup.manager.upgrade() {
                manager.remove_subscription(setup.subscription_id);
            }
        }
    }
}
