//! Per-connection request dispatch
//!
//! Parse one request head, route on `scheme://host`, check the tunnel's
//! credential, then either write a fixed error response or hand the live
//! connection to the tunnel.

use crate::request::{read_request, ParsedRequest, RequestError};
use crate::response;
use crate::supervisor::supervise;
use ingress_connection::PublicConnection;
use ingress_http_auth::{AuthResult, HttpAuthenticator};
use ingress_router::{RouteKey, Scheme, TunnelRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MAX_REQUEST_HEAD, DEFAULT_REQUEST_TIMEOUT};

/// Why a connection was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    BadRequest,
    NotFound { host: String },
    NotAuthorized,
}

/// Terminal state of one dispatched connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Error response written and connection closed
    Rejected(Rejection),
    /// Connection handed to the tunnel, which has since returned
    HandedOff,
}

pub struct Dispatcher {
    scheme: Scheme,
    registry: Arc<dyn TunnelRegistry>,
    request_timeout: Option<Duration>,
    max_request_head: usize,
}

impl Dispatcher {
    pub fn new(scheme: Scheme, registry: Arc<dyn TunnelRegistry>) -> Self {
        Self {
            scheme,
            registry,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_request_head: DEFAULT_MAX_REQUEST_HEAD,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_request_head(mut self, max: usize) -> Self {
        self.max_request_head = max;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Dispatch `conn` inside a fault boundary.
    ///
    /// A panic anywhere in parsing, routing, auth or the tunnel's handler is
    /// logged against the connection and swallowed; unwinding drops (closes)
    /// the connection. Returns `None` in that case.
    pub async fn serve(&self, conn: PublicConnection) -> Option<DispatchOutcome> {
        let conn_id = conn.id().clone();
        supervise(conn_id, self.dispatch(conn)).await
    }

    /// Dispatch `conn` without a fault boundary
    pub async fn dispatch(&self, mut conn: PublicConnection) -> DispatchOutcome {
        let request = match self.read_request(&mut conn).await {
            Ok(request) => request,
            Err(e) => {
                warn!(conn = %conn.id(), "Failed to read valid {} request: {}", self.scheme, e);
                return self
                    .reject(conn, Rejection::BadRequest, response::BAD_REQUEST.to_vec())
                    .await;
            }
        };

        let host = request.host.clone();
        debug!(conn = %conn.id(), "Found hostname {} in request", host);

        let key = RouteKey::new(self.scheme, host);
        let Some(tunnel) = self.registry.lookup(&key) else {
            info!(conn = %conn.id(), "No tunnel found for hostname {}", key.host());
            let body = response::not_found(key.host());
            let host = key.host().to_string();
            return self.reject(conn, Rejection::NotFound { host }, body).await;
        };

        let authenticator = HttpAuthenticator::from_credential(tunnel.http_auth());
        if authenticator.requires_auth() {
            if let AuthResult::Unauthorized(body) =
                authenticator.authenticate(request.authorization())
            {
                info!(
                    conn = %conn.id(),
                    auth = authenticator.auth_type(),
                    "Authentication failed: {}",
                    String::from_utf8_lossy(request.authorization().unwrap_or_default())
                );
                return self.reject(conn, Rejection::NotAuthorized, body).await;
            }
        }

        debug!(
            conn = %conn.id(),
            "Handing off to tunnel {} ({} bytes buffered)",
            key,
            request.raw.len()
        );
        conn.unread(request.raw);
        tunnel.handle_public_connection(conn).await;
        DispatchOutcome::HandedOff
    }

    async fn read_request(
        &self,
        conn: &mut PublicConnection,
    ) -> Result<ParsedRequest, RequestError> {
        let read = read_request(conn, self.max_request_head);
        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .unwrap_or(Err(RequestError::Timeout(timeout))),
            None => read.await,
        }
    }

    async fn reject(
        &self,
        mut conn: PublicConnection,
        rejection: Rejection,
        response: Vec<u8>,
    ) -> DispatchOutcome {
        if let Err(e) = conn.write_all(&response).await {
            debug!(conn = %conn.id(), "Failed to write {:?} response: {}", rejection, e);
        }
        conn.close().await;
        DispatchOutcome::Rejected(rejection)
    }
}
