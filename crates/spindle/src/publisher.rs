// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher entities.
//!
//! A publish always goes out through the middleware handle so inter-process
//! subscribers are served. With intra-process comms enabled, the owned
//! message is additionally stored in the manager's ring buffer and a tiny
//! notice is published on the companion topic; in-process subscribers claim
//! the stored message and drop the middleware duplicate by sender gid.

use crate::intra_process::{IntraProcessManager, IntraProcessNotice};
use crate::message::{type_descriptor, Message};
use crate::rmw;
use crate::{Error, Result};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, Weak};

struct IntraProcessSetup {
    publisher_id: u64,
    notice_handle: Arc<rmw::PublisherHandle>,
    manager: Weak<IntraProcessManager>,
}

/// A typed publisher bound to one topic.
pub struct Publisher<T: Message + Clone> {
    handle: Arc<rmw::PublisherHandle>,
    intra: OnceLock<IntraProcessSetup>,
    _message: PhantomData<T>,
}

impl<T: Message + Clone> Publisher<T> {
    pub(crate) fn new(handle: Arc<rmw::PublisherHandle>) -> Self {
        Self {
            handle,
            intra: OnceLock::new(),
            _message: PhantomData,
        }
    }

    /// Wire this publisher into the intra-process manager. Called once by the
    /// node right after creation.
    pub(crate) fn setup_intra_process(
        &self,
        publisher_id: u64,
        notice_handle: Arc<rmw::PublisherHandle>,
        manager: Weak<IntraProcessManager>,
    ) {
        let setup = IntraProcessSetup {
            publisher_id,
            notice_handle,
            manager,
        };
        if self.intra.set(setup).is_err() {
            log::error!(
                "[publisher] intra-process setup ran twice on '{}'",
                self.handle.topic()
            );
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        self.handle.topic()
    }

    /// Identity attached to every message this publisher sends.
    #[must_use]
    pub fn gid(&self) -> rmw::Gid {
        self.handle.gid()
    }

    /// Publish a message.
    ///
    /// # Errors
    ///
    /// [`Error::ManagerDestroyed`] when intra-process comms are enabled and
    /// the manager is gone; [`Error::TypeMismatch`] when the stored type does
    /// not match the registration.
    pub fn publish(&self, message: T) -> Result<()> {
        match self.intra.get() {
            Some(setup) => {
                let manager = setup.manager.upgrade().ok_or(Error::ManagerDestroyed)?;
                let inter_copy = message.clone();
                let seq = manager.store_intra_process_message(
                    setup.publisher_id,
                    Box::new(message),
                    type_descriptor::<T>(),
                )?;
                setup.notice_handle.publish(Arc::new(IntraProcessNotice {
                    publisher_id: setup.publisher_id,
                    message_seq: seq,
                }));
                self.handle.publish(Arc::new(inter_copy));
            }
            None => self.handle.publish(Arc::new(message)),
        }
        Ok(())
    }
}

impl<T: Message + Clone> Drop for Publisher<T> {
    fn drop(&mut self) {
        if let Some(setup) = self.intra.get() {
            if let Some(manager) = setup.manager.upgrade() {
                manager.remove_publisher(setup.publisher_id);
            }
        }
    }
}
