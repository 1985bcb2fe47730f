//! Fixed responses written to rejected public connections
//!
//! All are HTTP/1.0 with an explicit Content-Length; the body is never
//! chunked and the connection is closed right after.

pub use ingress_http_auth::{not_authorized_response, NOT_AUTHORIZED_BODY};

/// 400 for anything that is not a readable HTTP request
pub const BAD_REQUEST: &[u8] =
    b"HTTP/1.0 400 Bad Request\r\nContent-Length: 12\r\n\r\nBad Request\n";

/// 502 written by tunnels that cannot reach their backend
pub const BAD_GATEWAY: &[u8] =
    b"HTTP/1.0 502 Bad Gateway\r\nContent-Length: 12\r\n\r\nBad Gateway\n";

/// Bytes the 404 body adds around the host (`"Tunnel "` + `" not found\n"`)
pub const NOT_FOUND_WRAPPER_LEN: usize = 18;

/// 404 naming the host that has no tunnel
pub fn not_found(host: &str) -> Vec<u8> {
    format!(
        "HTTP/1.0 404 Not Found\r\nContent-Length: {}\r\n\r\nTunnel {} not found\n",
        host.len() + NOT_FOUND_WRAPPER_LEN,
        host
    )
    .into_bytes()
}
