// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client entities (the request side of request/reply).

use crate::message::Message;
use crate::rmw;
use crate::service::Srv;
use crate::{Error, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Type-erased client interface used by the engine.
pub trait ClientBase: Send + Sync {
    /// Name of the service this client calls.
    fn service_name(&self) -> &str;

    /// Middleware handle carrying responses.
    fn handle(&self) -> &Arc<rmw::ClientHandle>;

    /// Take one response and resolve the pending call it answers.
    fn execute(&self) -> Result<()>;
}

/// A typed client bound to one service.
pub struct Client<S: Srv> {
    handle: Arc<rmw::ClientHandle>,
    pending: DashMap<i64, Sender<S::Response>>,
    _service: PhantomData<S>,
}

impl<S: Srv> Client<S> {
    pub(crate) fn new(handle: Arc<rmw::ClientHandle>) -> Self {
        Self {
            handle,
            pending: DashMap::new(),
            _service: PhantomData,
        }
    }

    /// Send a request; the returned handle resolves when an engine dispatches
    /// the response.
    ///
    /// # Errors
    ///
    /// [`Error::SendFailed`] when no service with this name exists.
    pub fn call_async(&self, request: S::Request) -> Result<PendingResponse<S::Response>> {
        let (sender, receiver) = bounded(1);
        let sequence = self.handle.allocate_sequence();
        // Register before sending so a response dispatched from another
        // thread always finds its slot.
        self.pending.insert(sequence, sender);

        if let Err(e) = self
            .handle
            .send_request_with_sequence(sequence, Arc::new(request))
        {
            self.pending.remove(&sequence);
            return Err(e);
        }
        Ok(PendingResponse { receiver })
    }
}

impl<S: Srv> ClientBase for Client<S> {
    fn service_name(&self) -> &str {
        self.handle.service_name()
    }

    fn handle(&self) -> &Arc<rmw::ClientHandle> {
        &self.handle
    }

    fn execute(&self) -> Result<()> {
        let Some((sequence, payload)) = self.handle.take_response() else {
            return Ok(());
        };

        let Some((_, sender)) = self.pending.remove(&sequence) else {
            log::warn!(
                "[client] response {} on '{}' has no pending call",
                sequence,
                self.handle.service_name()
            );
            return Ok(());
        };

        let response = payload.downcast::<S::Response>().map_err(|_| Error::TakeFailed {
            entity: "client",
            reason: format!(
                "unexpected response type on '{}'",
                self.handle.service_name()
            ),
        })?;

        // The caller may have dropped its PendingResponse; that is fine.
        let _ = sender.send((*response).clone());
        Ok(())
    }
}

/// A call in flight. Resolved by whichever engine dispatches the response.
pub struct PendingResponse<R> {
    receiver: Receiver<R>,
}

impl<R: Message> PendingResponse<R> {
    /// Block until the response arrives.
    ///
    /// # Errors
    ///
    /// [`Error::TakeFailed`] when the client was dropped before resolving.
    pub fn wait(self) -> Result<R> {
        self.receiver.recv().map_err(|_| Error::TakeFailed {
            entity: "client",
            reason: "pending call abandoned before a response arrived".to_string(),
        })
    }

    /// Block for at most `timeout`; `None` on expiry or abandonment.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<R> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
