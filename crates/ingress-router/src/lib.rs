//! Routing for public HTTP(S) ingress
//!
//! Public requests are matched to tunnels by a [`RouteKey`] built from the
//! listener's scheme and the request's virtual host (`https://api.example.com`).
//! Matching is exact: no wildcard fallback, no port stripping, no case folding.

pub mod registry;
pub mod tunnel;

pub use registry::{RouteError, RouteRegistry, TunnelRegistry};
pub use tunnel::TunnelHandle;

use std::fmt;

/// Protocol a public listener speaks, fixed when the listener is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// `https` when the listener terminates TLS, `http` otherwise
    pub fn for_listener(tls: bool) -> Self {
        if tls {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing key: `<scheme>://<host>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    scheme: Scheme,
    host: String,
}

impl RouteKey {
    pub fn new(scheme: Scheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
        }
    }

    /// Parse a tunnel URL such as `http://foo.example.com` or
    /// `https://foo.example.com:8443`.
    pub fn parse(url: &str) -> Result<Self, RouteError> {
        let (scheme, host) = if let Some(host) = url.strip_prefix("http://") {
            (Scheme::Http, host)
        } else if let Some(host) = url.strip_prefix("https://") {
            (Scheme::Https, host)
        } else {
            return Err(RouteError::InvalidRouteKey(url.to_string()));
        };

        let invalid = |c: char| matches!(c, '/' | '?' | '#') || c.is_whitespace();
        if host.is_empty() || host.contains(invalid) {
            return Err(RouteError::InvalidRouteKey(url.to_string()));
        }

        Ok(Self::new(scheme, host))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}
