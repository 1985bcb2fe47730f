//! Public HTTP(S) listener
//!
//! Binds once, then accepts forever. Every accepted socket gets its own task,
//! which finishes the TLS handshake (HTTPS only) and runs the dispatcher.
//! The accept loop never waits on a handshake or a request.

use crate::config::HttpIngressConfig;
use crate::dispatcher::Dispatcher;
use crate::IngressError;
use futures::{Stream, StreamExt};
use ingress_connection::PublicConnection;
use ingress_router::{Scheme, TunnelRegistry};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// A socket accepted by the listener, not yet past its TLS handshake
pub struct Accepted {
    stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    handshake_timeout: Option<Duration>,
}

impl Accepted {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Finish the TLS handshake if the listener terminates TLS.
    ///
    /// The handshake shares the request-head deadline; a stalled client
    /// gets `TimedOut`.
    pub async fn into_connection(self) -> io::Result<PublicConnection> {
        match self.acceptor {
            Some(acceptor) => {
                let handshake = acceptor.accept(self.stream);
                let tls_stream = match self.handshake_timeout {
                    Some(timeout) => tokio::time::timeout(timeout, handshake)
                        .await
                        .map_err(|_| {
                            io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out")
                        })??,
                    None => handshake.await?,
                };
                debug!("TLS handshake completed for {}", self.peer_addr);
                Ok(PublicConnection::new(tls_stream, Some(self.peer_addr)))
            }
            None => Ok(PublicConnection::new(self.stream, Some(self.peer_addr))),
        }
    }
}

pub struct IngressListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    handshake_timeout: Option<Duration>,
    dispatcher: Arc<Dispatcher>,
}

impl IngressListener {
    /// Bind the public socket. Failing to bind is fatal and never retried.
    pub async fn bind(
        config: HttpIngressConfig,
        registry: Arc<dyn TunnelRegistry>,
    ) -> Result<Self, IngressError> {
        let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
            let port = config.bind_addr.port();
            let address = config.bind_addr.ip().to_string();
            let reason = e.to_string();
            IngressError::BindError {
                address,
                port,
                reason,
            }
        })?;
        let local_addr = listener.local_addr()?;

        let scheme = Scheme::for_listener(config.tls.is_some());
        let acceptor = config.tls.map(TlsAcceptor::from);
        let handshake_timeout = config.request_timeout;
        let dispatcher = Dispatcher::new(scheme, registry)
            .with_request_timeout(config.request_timeout)
            .with_max_request_head(config.max_request_head);

        info!(
            "Listening for public {} connections on {}",
            scheme, local_addr
        );

        Ok(Self {
            listener,
            local_addr,
            acceptor,
            handshake_timeout,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn scheme(&self) -> Scheme {
        self.dispatcher.scheme()
    }

    /// Endless, lazy sequence of accepted sockets
    pub fn incoming(&self) -> impl Stream<Item = io::Result<Accepted>> + '_ {
        futures::stream::unfold(self, |this| async move {
            let accepted = this
                .listener
                .accept()
                .await
                .map(|(stream, peer_addr)| Accepted {
                    stream,
                    peer_addr,
                    acceptor: this.acceptor.clone(),
                    handshake_timeout: this.handshake_timeout,
                });
            Some((accepted, this))
        })
    }

    /// Accept connections forever, one dispatcher task per connection
    pub async fn run(self) -> Result<(), IngressError> {
        let incoming = self.incoming();
        futures::pin_mut!(incoming);

        while let Some(accepted) = incoming.next().await {
            match accepted {
                Ok(accepted) => {
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        let peer_addr = accepted.peer_addr();
                        match accepted.into_connection().await {
                            Ok(conn) => {
                                dispatcher.serve(conn).await;
                            }
                            Err(e) => {
                                debug!("TLS handshake failed from {}: {}", peer_addr, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept public connection: {}", e);
                }
            }
        }

        Ok(())
    }
}

/// Bind `config.bind_addr` and serve until the process exits
pub async fn serve(
    config: HttpIngressConfig,
    registry: Arc<dyn TunnelRegistry>,
) -> Result<(), IngressError> {
    IngressListener::bind(config, registry).await?.run().await
}
