//! Tunnel handle seen by the public ingress

use async_trait::async_trait;
use ingress_connection::PublicConnection;

/// A registered tunnel that can take over public connections.
///
/// Implementations own their transport. The ingress only reads
/// [`http_auth`](TunnelHandle::http_auth) and calls
/// [`handle_public_connection`](TunnelHandle::handle_public_connection).
#[async_trait]
pub trait TunnelHandle: Send + Sync {
    /// Credential the `Authorization` header must equal byte-for-byte.
    /// Empty means the tunnel is public.
    fn http_auth(&self) -> &str;

    /// Take ownership of a matched public connection and drive it until done.
    ///
    /// Any bytes the ingress consumed while routing are replayed first by
    /// reads on `conn`, so the tunnel sees the request exactly as sent.
    async fn handle_public_connection(&self, conn: PublicConnection);
}
