// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nodes: addressable participants owning communication entities.
//!
//! A node is the factory for publishers, subscriptions, timers, services and
//! clients. Every entity it creates belongs to exactly one callback group
//! known to the node; callers either pass a group they created through
//! [`Node::create_callback_group`] or get the node's default group.
//!
//! With `use_intra_process` enabled at construction, publishers and
//! subscriptions are additionally registered with the context's
//! intra-process manager and get companion endpoints on the reserved
//! `__intra` notice topic.
//!
//! ## Example
//!
//! ```rust,no_run
//! use spindle::Node;
//!
//! # fn main() -> spindle::Result<()> {
//! let node = Node::builder("talker").use_intra_process(true).build()?;
//! let publisher = node.create_publisher::<String>("chatter", 10)?;
//! publisher.publish("hello".to_string())?;
//! # Ok(())
//! # }
//! ```

use crate::callback_group::{CallbackGroup, CallbackGroupType};
use crate::client::{Client, ClientBase};
use crate::context::Context;
use crate::intra_process::{IntraProcessNotice, NOTICE_TOPIC_SUFFIX};
use crate::message::{type_descriptor, type_id_of, Message};
use crate::parameters::ParameterValue;
use crate::publisher::Publisher;
use crate::rmw;
use crate::service::{Service, ServiceBase, Srv};
use crate::subscription::{Subscription, SubscriptionBase, SubscriptionCallback};
use crate::timer::WallTimer;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Options accepted by [`Node::create_subscription_with_options`].
pub struct SubscriptionOptions {
    /// History depth of the staging queue.
    pub depth: usize,
    /// Drop messages published from this node.
    pub ignore_local_publications: bool,
    /// Callback group to join; the node's default group when `None`.
    pub group: Option<Arc<CallbackGroup>>,
}

impl SubscriptionOptions {
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            depth: 10,
            ignore_local_publications: false,
            group: None,
        }
    }
}

/// Builder for [`Node`].
pub struct NodeBuilder {
    name: String,
    use_intra_process: bool,
    context: Option<Arc<Context>>,
}

impl NodeBuilder {
    /// Enable the intra-process short-circuit for this node's publishers and
    /// subscriptions.
    #[must_use]
    pub fn use_intra_process(mut self, enabled: bool) -> Self {
        self.use_intra_process = enabled;
        self
    }

    /// Attach the node to a specific context instead of the global one.
    #[must_use]
    pub fn context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Construct the node.
    ///
    /// # Errors
    ///
    /// [`Error::CreateFailed`] when the name is empty.
    pub fn build(self) -> Result<Arc<Node>> {
        if self.name.is_empty() {
            return Err(Error::CreateFailed {
                entity: "node",
                reason: "node name must not be empty".to_string(),
            });
        }

        static NEXT_PARTICIPANT: AtomicU64 = AtomicU64::new(1);
        let node = Arc::new(Node {
            name: self.name,
            participant: NEXT_PARTICIPANT.fetch_add(1, Ordering::Relaxed),
            use_intra_process: self.use_intra_process,
            context: self.context.unwrap_or_else(Context::global),
            default_group: Arc::new(CallbackGroup::new(CallbackGroupType::MutuallyExclusive)),
            groups: Mutex::new(Vec::new()),
            notify_guard: rmw::create_guard_condition(),
            parameters: Mutex::new(BTreeMap::new()),
            number_of_publishers: AtomicUsize::new(0),
            number_of_subscriptions: AtomicUsize::new(0),
            number_of_timers: AtomicUsize::new(0),
            number_of_services: AtomicUsize::new(0),
            number_of_clients: AtomicUsize::new(0),
        });
        log::debug!("[node] '{}' created (participant {})", node.name, node.participant);
        Ok(node)
    }
}

/// An addressable participant owning entity collections.
pub struct Node {
    name: String,
    participant: u64,
    use_intra_process: bool,
    context: Arc<Context>,
    default_group: Arc<CallbackGroup>,
    groups: Mutex<Vec<Weak<CallbackGroup>>>,
    notify_guard: Arc<rmw::GuardCondition>,
    pub(crate) parameters: Mutex<BTreeMap<String, ParameterValue>>,
    number_of_publishers: AtomicUsize,
    number_of_subscriptions: AtomicUsize,
    number_of_timers: AtomicUsize,
    number_of_services: AtomicUsize,
    number_of_clients: AtomicUsize,
}

impl Node {
    /// Start building a node named `name`.
    #[must_use]
    pub fn builder(name: &str) -> NodeBuilder {
        NodeBuilder {
            name: name.to_string(),
            use_intra_process: false,
            context: None,
        }
    }

    /// Shorthand for `Node::builder(name).build()`.
    pub fn new(name: &str) -> Result<Arc<Self>> {
        Self::builder(name).build()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn use_intra_process(&self) -> bool {
        self.use_intra_process
    }

    /// The default callback group entities join when none is given.
    #[must_use]
    pub fn default_callback_group(&self) -> Arc<CallbackGroup> {
        Arc::clone(&self.default_group)
    }

    /// Guard condition triggered whenever this node's entity set changes.
    #[must_use]
    pub fn notify_guard(&self) -> Arc<rmw::GuardCondition> {
        Arc::clone(&self.notify_guard)
    }

    /// Create a callback group registered with this node.
    #[must_use]
    pub fn create_callback_group(&self, group_type: CallbackGroupType) -> Arc<CallbackGroup> {
        let group = Arc::new(CallbackGroup::new(group_type));
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups.retain(|weak| weak.upgrade().is_some());
        groups.push(Arc::downgrade(&group));
        group
    }

    /// The default group plus every live user group, in creation order.
    pub(crate) fn callback_groups(&self) -> Vec<Arc<CallbackGroup>> {
        let mut result = vec![Arc::clone(&self.default_group)];
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        result.extend(groups.iter().filter_map(Weak::upgrade));
        result
    }

    fn group_in_node(&self, group: &Arc<CallbackGroup>) -> bool {
        if Arc::ptr_eq(group, &self.default_group) {
            return true;
        }
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .any(|registered| Arc::ptr_eq(&registered, group))
    }

    fn resolve_group(&self, group: Option<&Arc<CallbackGroup>>) -> Result<Arc<CallbackGroup>> {
        match group {
            Some(group) => {
                if !self.group_in_node(group) {
                    return Err(Error::GroupNotInNode);
                }
                Ok(Arc::clone(group))
            }
            None => Ok(Arc::clone(&self.default_group)),
        }
    }

    /// Create a publisher on `topic` with the given history depth.
    pub fn create_publisher<T: Message + Clone>(
        &self,
        topic: &str,
        depth: usize,
    ) -> Result<Arc<Publisher<T>>> {
        let descriptor = type_descriptor::<T>();
        let handle = rmw::create_publisher(self.participant, topic, depth, descriptor.type_id);
        let publisher = Arc::new(Publisher::new(handle));

        if self.use_intra_process {
            let manager = self.context.intra_process_manager();
            let publisher_id = manager.add_publisher(topic, publisher.gid(), depth, descriptor);
            let notice_handle = rmw::create_publisher(
                self.participant,
                &format!("{}{}", topic, NOTICE_TOPIC_SUFFIX),
                depth,
                type_id_of::<IntraProcessNotice>(),
            );
            publisher.setup_intra_process(publisher_id, notice_handle, Arc::downgrade(&manager));
        }

        self.number_of_publishers.fetch_add(1, Ordering::Relaxed);
        self.notify_guard.trigger();
        Ok(publisher)
    }

    /// Create a subscription whose callback receives messages by value.
    pub fn create_subscription<T, F>(
        &self,
        topic: &str,
        depth: usize,
        callback: F,
    ) -> Result<Arc<Subscription<T>>>
    where
        T: Message + Clone,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.create_subscription_internal(
            topic,
            SubscriptionOptions::with_depth(depth),
            SubscriptionCallback::Value(Box::new(callback)),
        )
    }

    /// Create a subscription with explicit options.
    pub fn create_subscription_with_options<T, F>(
        &self,
        topic: &str,
        options: SubscriptionOptions,
        callback: F,
    ) -> Result<Arc<Subscription<T>>>
    where
        T: Message + Clone,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.create_subscription_internal(
            topic,
            options,
            SubscriptionCallback::Value(Box::new(callback)),
        )
    }

    /// Create a subscription whose callback receives the boxed message.
    ///
    /// On the sole-subscriber intra-process path the box is the publisher's
    /// original allocation, untouched.
    pub fn create_subscription_with_boxed_callback<T, F>(
        &self,
        topic: &str,
        options: SubscriptionOptions,
        callback: F,
    ) -> Result<Arc<Subscription<T>>>
    where
        T: Message + Clone,
        F: Fn(Box<T>) + Send + Sync + 'static,
    {
        self.create_subscription_internal(
            topic,
            options,
            SubscriptionCallback::Boxed(Box::new(callback)),
        )
    }

    fn create_subscription_internal<T: Message + Clone>(
        &self,
        topic: &str,
        options: SubscriptionOptions,
        callback: SubscriptionCallback<T>,
    ) -> Result<Arc<Subscription<T>>> {
        let group = self.resolve_group(options.group.as_ref())?;
        let descriptor = type_descriptor::<T>();

        let handle = rmw::create_subscription(
            self.participant,
            topic,
            options.depth,
            options.ignore_local_publications,
            descriptor.type_id,
        );
        let subscription = Arc::new(Subscription::new(handle, topic.to_string(), callback));

        if self.use_intra_process {
            let manager = self.context.intra_process_manager();
            let base: Arc<dyn SubscriptionBase> =
                Arc::clone(&subscription) as Arc<dyn SubscriptionBase>;
            let subscription_id = manager.add_subscription(
                topic,
                Arc::downgrade(&base),
                options.ignore_local_publications,
                descriptor,
            );
            let notice_handle = rmw::create_subscription(
                self.participant,
                &format!("{}{}", topic, NOTICE_TOPIC_SUFFIX),
                options.depth,
                false,
                type_id_of::<IntraProcessNotice>(),
            );
            subscription.setup_intra_process(
                subscription_id,
                notice_handle,
                Arc::downgrade(&manager),
            );
        }

        group.add_subscription(&(Arc::clone(&subscription) as Arc<dyn SubscriptionBase>));
        self.number_of_subscriptions.fetch_add(1, Ordering::Relaxed);
        self.notify_guard.trigger();
        Ok(subscription)
    }

    /// Create a periodic wall timer.
    pub fn create_wall_timer<F>(
        &self,
        period: Duration,
        callback: F,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<Arc<WallTimer>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let group = self.resolve_group(group)?;
        let handle = rmw::create_timer(period);
        let timer = Arc::new(WallTimer::new(handle, Box::new(callback)));
        group.add_timer(&timer);
        self.number_of_timers.fetch_add(1, Ordering::Relaxed);
        self.notify_guard.trigger();
        Ok(timer)
    }

    /// Create a service endpoint answering on `service_name`.
    pub fn create_service<S, F>(
        &self,
        service_name: &str,
        callback: F,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<Arc<Service<S>>>
    where
        S: Srv,
        F: Fn(S::Request) -> S::Response + Send + Sync + 'static,
    {
        let group = self.resolve_group(group)?;
        let handle = rmw::create_service(service_name)?;
        let service = Arc::new(Service::<S>::new(handle, Box::new(callback)));
        group.add_service(Arc::clone(&service) as Arc<dyn ServiceBase>);
        self.number_of_services.fetch_add(1, Ordering::Relaxed);
        self.notify_guard.trigger();
        Ok(service)
    }

    /// Create a client bound to the service named `service_name`.
    pub fn create_client<S: Srv>(
        &self,
        service_name: &str,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<Arc<Client<S>>> {
        let group = self.resolve_group(group)?;
        let handle = rmw::create_client(service_name);
        let client = Arc::new(Client::<S>::new(handle));
        group.add_client(Arc::clone(&client) as Arc<dyn ClientBase>);
        self.number_of_clients.fetch_add(1, Ordering::Relaxed);
        self.notify_guard.trigger();
        Ok(client)
    }

    #[must_use]
    pub fn count_publishers(&self) -> usize {
        self.number_of_publishers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn count_subscriptions(&self) -> usize {
        self.number_of_subscriptions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn count_timers(&self) -> usize {
        self.number_of_timers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn count_services(&self) -> usize {
        self.number_of_services.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn count_clients(&self) -> usize {
        self.number_of_clients.load(Ordering::Relaxed)
    }
}
