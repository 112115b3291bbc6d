// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service and client handles plus the request/reply routing tables.
//!
//! A request carries the sending client's identity and a per-client sequence
//! number; the response is routed back to that client through a global
//! client table. Service names are unique within the process.

use crate::message::SharedMessage;
use crate::rmw::waitset::SignalList;
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

/// Identity of an in-flight request: which client sent it and its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId {
    pub client_id: u64,
    pub sequence_number: i64,
}

/// Owning handle for a service endpoint.
pub struct ServiceHandle {
    id: u64,
    name: String,
    requests: Mutex<VecDeque<(RequestId, SharedMessage)>>,
    signals: SignalList,
}

impl ServiceHandle {
    fn new(name: String) -> Self {
        Self {
            id: next_rpc_id(),
            name,
            requests: Mutex::new(VecDeque::new()),
            signals: SignalList::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.name
    }

    /// True when at least one request is pending.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub(crate) fn signals(&self) -> &SignalList {
        &self.signals
    }

    fn push_request(&self, request_id: RequestId, request: SharedMessage) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((request_id, request));
        self.signals.notify_all();
    }

    /// Take the oldest pending request, if any.
    pub fn take_request(&self) -> Option<(RequestId, SharedMessage)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Route a response back to the client that issued `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailed`] when the client is gone.
    pub fn send_response(&self, request_id: RequestId, response: SharedMessage) -> Result<()> {
        let client = rpc_registry()
            .client(request_id.client_id)
            .ok_or_else(|| {
                Error::SendFailed(format!(
                    "client {} for service '{}' no longer exists",
                    request_id.client_id, self.name
                ))
            })?;
        client.push_response(request_id.sequence_number, response);
        Ok(())
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        rpc_registry().unregister_service(&self.name, self.id);
    }
}

/// Owning handle for a client endpoint.
pub struct ClientHandle {
    id: u64,
    name: String,
    sequence: AtomicI64,
    responses: Mutex<VecDeque<(i64, SharedMessage)>>,
    signals: SignalList,
}

impl ClientHandle {
    fn new(name: String) -> Self {
        Self {
            id: next_rpc_id(),
            name,
            sequence: AtomicI64::new(1),
            responses: Mutex::new(VecDeque::new()),
            signals: SignalList::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.name
    }

    /// True when at least one response is pending.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub(crate) fn signals(&self) -> &SignalList {
        &self.signals
    }

    /// Reserve the sequence number for the next request.
    ///
    /// Callers that dispatch responses from other threads reserve first so
    /// the pending-call bookkeeping is in place before the request is visible
    /// to the service.
    #[must_use]
    pub fn allocate_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request under a previously reserved sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailed`] when no service with this name exists.
    pub fn send_request_with_sequence(
        &self,
        sequence_number: i64,
        request: SharedMessage,
    ) -> Result<()> {
        let service = rpc_registry().service(&self.name).ok_or_else(|| {
            Error::SendFailed(format!("no service named '{}'", self.name))
        })?;
        service.push_request(
            RequestId {
                client_id: self.id,
                sequence_number,
            },
            request,
        );
        Ok(())
    }

    /// Send a request to the service this client is bound to.
    ///
    /// Returns the sequence number identifying the pending call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailed`] when no service with this name exists.
    pub fn send_request(&self, request: SharedMessage) -> Result<i64> {
        let sequence_number = self.allocate_sequence();
        self.send_request_with_sequence(sequence_number, request)?;
        Ok(sequence_number)
    }

    fn push_response(&self, sequence_number: i64, response: SharedMessage) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((sequence_number, response));
        self.signals.notify_all();
    }

    /// Take the oldest pending response, if any.
    pub fn take_response(&self) -> Option<(i64, SharedMessage)> {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        rpc_registry().unregister_client(self.id);
    }
}

struct RpcRegistry {
    services: RwLock<HashMap<String, Weak<ServiceHandle>>>,
    clients: RwLock<HashMap<u64, Weak<ClientHandle>>>,
}

fn rpc_registry() -> &'static RpcRegistry {
    static REGISTRY: OnceLock<RpcRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| RpcRegistry {
        services: RwLock::new(HashMap::new()),
        clients: RwLock::new(HashMap::new()),
    })
}

impl RpcRegistry {
    fn service(&self, name: &str) -> Option<Arc<ServiceHandle>> {
        self.services
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .and_then(Weak::upgrade)
    }

    fn client(&self, id: u64) -> Option<Arc<ClientHandle>> {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .and_then(Weak::upgrade)
    }

    fn register_service(&self, handle: &Arc<ServiceHandle>) -> Result<()> {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = services.get(handle.service_name()) {
            if existing.upgrade().is_some() {
                return Err(Error::CreateFailed {
                    entity: "service",
                    reason: format!("service '{}' already exists", handle.service_name()),
                });
            }
        }
        services.insert(handle.service_name().to_string(), Arc::downgrade(handle));
        Ok(())
    }

    fn unregister_service(&self, name: &str, id: u64) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        // Only remove our own registration; the name may have been reused.
        if let Some(existing) = services.get(name) {
            let stale = match existing.upgrade() {
                Some(live) => live.id() == id,
                None => true,
            };
            if stale {
                services.remove(name);
            }
        }
    }

    fn register_client(&self, handle: &Arc<ClientHandle>) {
        let mut clients = self.clients.write().unwrap_or_else(|e| e.into_inner());
        clients.retain(|_, weak| weak.upgrade().is_some());
        clients.insert(handle.id(), Arc::downgrade(handle));
    }

    fn unregister_client(&self, id: u64) {
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}

pub(crate) fn create_service_handle(name: &str) -> Result<Arc<ServiceHandle>> {
    let handle = Arc::new(ServiceHandle::new(name.to_string()));
    rpc_registry().register_service(&handle)?;
    Ok(handle)
}

pub(crate) fn create_client_handle(name: &str) -> Arc<ClientHandle> {
    let handle = Arc::new(ClientHandle::new(name.to_string()));
    rpc_registry().register_client(&handle);
    handle
}

fn next_rpc_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_reply_round_trip() {
        let service = create_service_handle("rpc/add_two").expect("service");
        let client = create_client_handle("rpc/add_two");

        let seq = client.send_request(Arc::new(40i32)).expect("send");
        let (request_id, request) = service.take_request().expect("request");
        assert_eq!(request_id.sequence_number, seq);
        let value = *request.downcast::<i32>().expect("i32 request");

        service
            .send_response(request_id, Arc::new(value + 2))
            .expect("respond");
        let (reply_seq, reply) = client.take_response().expect("response");
        assert_eq!(reply_seq, seq);
        assert_eq!(*reply.downcast::<i32>().expect("i32 reply"), 42);
    }

    #[test]
    fn test_duplicate_service_name_fails() {
        let _service = create_service_handle("rpc/unique").expect("service");
        let duplicate = create_service_handle("rpc/unique");
        assert!(matches!(
            duplicate,
            Err(Error::CreateFailed { entity: "service", .. })
        ));
    }

    #[test]
    fn test_service_name_can_be_reused_after_drop() {
        let service = create_service_handle("rpc/reuse").expect("service");
        drop(service);
        assert!(create_service_handle("rpc/reuse").is_ok());
    }

    #[test]
    fn test_request_without_service_fails() {
        let client = create_client_handle("rpc/nobody_home");
        let result = client.send_request(Arc::new(0u8));
        assert!(matches!(result, Err(Error::SendFailed(_))));
    }

    #[test]
    fn test_response_to_dead_client_fails() {
        let service = create_service_handle("rpc/dead_client").expect("service");
        let client = create_client_handle("rpc/dead_client");
        client.send_request(Arc::new(1u8)).expect("send");
        let (request_id, _) = service.take_request().expect("request");
        drop(client);

        let result = service.send_response(request_id, Arc::new(2u8));
        assert!(matches!(result, Err(Error::SendFailed(_))));
    }
}
