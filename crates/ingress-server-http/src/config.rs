//! Public listener configuration

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::rustls::ServerConfig;

/// Default bound on how long a client may take to send its request head
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on the request line plus headers
pub const DEFAULT_MAX_REQUEST_HEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct HttpIngressConfig {
    pub bind_addr: SocketAddr,
    /// TLS termination; `None` serves plain HTTP
    pub tls: Option<Arc<ServerConfig>>,
    /// Deadline for reading the request head; `None` waits forever
    pub request_timeout: Option<Duration>,
    pub max_request_head: usize,
}

impl HttpIngressConfig {
    pub fn http(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    pub fn https(bind_addr: SocketAddr, tls: Arc<ServerConfig>) -> Self {
        Self {
            bind_addr,
            tls: Some(tls),
            ..Self::default()
        }
    }
}

impl Default for HttpIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 80)),
            tls: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_request_head: DEFAULT_MAX_REQUEST_HEAD,
        }
    }
}

impl fmt::Debug for HttpIngressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpIngressConfig")
            .field("bind_addr", &self.bind_addr)
            .field("tls", &self.tls.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("max_request_head", &self.max_request_head)
            .finish()
    }
}
