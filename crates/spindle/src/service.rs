// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service entities (the reply side of request/reply).

use crate::message::Message;
use crate::rmw;
use crate::{Error, Result};
use std::sync::Arc;

/// Pairs the request and response types of a service.
///
/// ```rust
/// use spindle::Srv;
///
/// struct AddTwoInts;
///
/// #[derive(Clone)]
/// struct AddTwoIntsRequest { a: i64, b: i64 }
/// #[derive(Clone)]
/// struct AddTwoIntsResponse { sum: i64 }
///
/// impl Srv for AddTwoInts {
///     type Request = AddTwoIntsRequest;
///     type Response = AddTwoIntsResponse;
/// }
/// ```
pub trait Srv: Send + Sync + 'static {
    type Request: Message + Clone;
    type Response: Message + Clone;
}

/// Type-erased service interface used by the engine.
pub trait ServiceBase: Send + Sync {
    /// Name this service answers on.
    fn service_name(&self) -> &str;

    /// Middleware handle carrying requests.
    fn handle(&self) -> &Arc<rmw::ServiceHandle>;

    /// Take one request, run the user callback and send the response.
    fn execute(&self) -> Result<()>;
}

/// A typed service endpoint.
pub struct Service<S: Srv> {
    handle: Arc<rmw::ServiceHandle>,
    callback: Box<dyn Fn(S::Request) -> S::Response + Send + Sync>,
}

impl<S: Srv> Service<S> {
    pub(crate) fn new(
        handle: Arc<rmw::ServiceHandle>,
        callback: Box<dyn Fn(S::Request) -> S::Response + Send + Sync>,
    ) -> Self {
        Self { handle, callback }
    }
}

impl<S: Srv> ServiceBase for Service<S> {
    fn service_name(&self) -> &str {
        self.handle.service_name()
    }

    fn handle(&self) -> &Arc<rmw::ServiceHandle> {
        &self.handle
    }

    fn execute(&self) -> Result<()> {
        let Some((request_id, payload)) = self.handle.take_request() else {
            return Ok(());
        };

        let request = payload.downcast::<S::Request>().map_err(|_| Error::TakeFailed {
            entity: "service",
            reason: format!(
                "unexpected request type on '{}'",
                self.handle.service_name()
            ),
        })?;

        let response = (self.callback)((*request).clone());

        if let Err(e) = self.handle.send_response(request_id, Arc::new(response)) {
            // The client may have gone away while we were computing; the
            // request itself was served.
            log::warn!(
                "[service] response on '{}' undeliverable: {}",
                self.handle.service_name(),
                e
            );
        }
        Ok(())
    }
}
