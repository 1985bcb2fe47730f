//! Tunnel that pipes each public connection to a fixed backend address

use async_trait::async_trait;
use ingress_connection::PublicConnection;
use ingress_router::TunnelHandle;
use ingress_server_http::response::BAD_GATEWAY;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

pub struct ForwardTunnel {
    backend: String,
    http_auth: String,
}

impl ForwardTunnel {
    pub fn new(backend: impl Into<String>, http_auth: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            http_auth: http_auth.into(),
        }
    }
}

#[async_trait]
impl TunnelHandle for ForwardTunnel {
    fn http_auth(&self) -> &str {
        &self.http_auth
    }

    async fn handle_public_connection(&self, mut conn: PublicConnection) {
        let mut backend = match TcpStream::connect(&self.backend).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(conn = %conn.id(), "Failed to connect to backend {}: {}", self.backend, e);
                if let Err(e) = conn.write_all(BAD_GATEWAY).await {
                    debug!(conn = %conn.id(), "Failed to write 502 response: {}", e);
                }
                conn.close().await;
                return;
            }
        };

        debug!(conn = %conn.id(), "Forwarding to {}", self.backend);

        match tokio::io::copy_bidirectional(&mut conn, &mut backend).await {
            Ok((to_backend, to_client)) => {
                debug!(
                    conn = %conn.id(),
                    "Forwarding finished: {} bytes to backend, {} bytes to client",
                    to_backend,
                    to_client
                );
            }
            Err(e) => {
                debug!(conn = %conn.id(), "Forwarding to {} ended: {}", self.backend, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_connection::Bytes;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_forwards_replayed_request_and_response() {
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();

        // Backend reads one request head and answers
        let server = tokio::spawn(async move {
            let (mut socket, _) = backend.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while !received.ends_with(b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0);
                received.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
            received
        });

        let (mut client, server_side) = tokio::io::duplex(4096);
        let mut conn = PublicConnection::new(server_side, None);
        conn.unread(bytes_of(b"GET / HTTP/1.1\r\nHost: app.example.com\r\n\r\n"));

        let tunnel = ForwardTunnel::new(backend_addr.to_string(), "");
        let forward = tokio::spawn(async move { tunnel.handle_public_connection(conn).await });

        let mut response = vec![0u8; 40];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
        drop(client);

        forward.await.unwrap();
        assert_eq!(
            server.await.unwrap(),
            b"GET / HTTP/1.1\r\nHost: app.example.com\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_gets_502() {
        // Grab a free port, then release it so nothing is listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let (mut client, server_side) = tokio::io::duplex(4096);
        let tunnel = ForwardTunnel::new(addr.to_string(), "");
        tunnel
            .handle_public_connection(PublicConnection::new(server_side, None))
            .await;

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, BAD_GATEWAY);
    }

    fn bytes_of(data: &'static [u8]) -> Bytes {
        Bytes::from_static(data)
    }
}
