//! Public HTTP/HTTPS ingress for tunnels
//!
//! Accepts connections from the internet, reads one request head, looks the
//! tunnel up by `scheme://host`, enforces the tunnel's credential and hands
//! the untouched connection to the tunnel. Rejected connections get one of
//! three fixed HTTP/1.0 responses (400, 404, 401) and are closed.

pub mod config;
pub mod dispatcher;
pub mod listener;
pub mod request;
pub mod response;
pub mod supervisor;
pub mod tls;

pub use config::HttpIngressConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher, Rejection};
pub use listener::{serve, Accepted, IngressListener};
pub use request::{ParsedRequest, RequestError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Failed to bind to {address}: {reason}\n\nTroubleshooting:\n  • Check if another process is using this port: lsof -i :{port}\n  • Try using a different address or port")]
    BindError {
        address: String,
        port: u16,
        reason: String,
    },
}
