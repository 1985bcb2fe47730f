//! Public HTTP/HTTPS ingress
//!
//! Accepts connections from the internet, reads the first request head,
//! picks the tunnel registered for `scheme://host` and hands the connection
//! over to it. Tunnels here forward to fixed backends listed in a YAML file.

mod config;
mod forward;

use anyhow::{Context, Result};
use clap::Parser;
use ingress_server_http::{tls, HttpIngressConfig, IngressListener};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::TunnelsConfig;

#[derive(Parser, Debug)]
#[command(name = "tunnel-ingress")]
#[command(about = "Route public HTTP/HTTPS connections to tunnels by Host", long_about = None)]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// HTTP listener bind address
    #[arg(long, env = "INGRESS_HTTP_ADDR", default_value = "0.0.0.0:80")]
    http_addr: SocketAddr,

    /// HTTPS listener bind address (requires --tls-cert and --tls-key)
    #[arg(long, env = "INGRESS_HTTPS_ADDR")]
    https_addr: Option<SocketAddr>,

    /// TLS certificate chain (PEM)
    #[arg(long, env = "INGRESS_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long, env = "INGRESS_TLS_KEY")]
    tls_key: Option<PathBuf>,

    /// YAML file listing the tunnels to serve
    #[arg(long, env = "INGRESS_TUNNELS")]
    tunnels: Option<PathBuf>,

    /// Seconds a client has to send its request head (0 waits forever)
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Largest request head accepted, in bytes
    #[arg(long, default_value = "65536")]
    max_request_head: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn listener_config(&self, mut config: HttpIngressConfig) -> HttpIngressConfig {
        config.request_timeout = self.request_timeout();
        config.max_request_head = self.max_request_head;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Only the ring provider is compiled in; make it the process default
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::ring::default_provider(),
    );

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!("Starting tunnel ingress");

    let tunnels = match &cli.tunnels {
        Some(path) => TunnelsConfig::load(path)?,
        None => TunnelsConfig::default(),
    };
    let registry = tunnels.build_registry()?;
    info!("{} tunnel(s) registered", registry.len());

    // Bind everything before serving anything: any bind failure is fatal
    let http_listener = IngressListener::bind(
        cli.listener_config(HttpIngressConfig::http(cli.http_addr)),
        registry.clone(),
    )
    .await?;

    let https_listener = match cli.https_addr {
        Some(https_addr) => {
            let cert_path = cli
                .tls_cert
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("HTTPS listener requires --tls-cert"))?;
            let key_path = cli
                .tls_key
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("HTTPS listener requires --tls-key"))?;

            let server_config = tls::server_config_from_pem(cert_path, key_path)
                .context("Failed to load TLS certificate")?;
            let listener = IngressListener::bind(
                cli.listener_config(HttpIngressConfig::https(https_addr, server_config)),
                registry.clone(),
            )
            .await?;
            Some(listener)
        }
        None => None,
    };

    let http_handle = tokio::spawn(http_listener.run());
    let https_handle = https_listener.map(|listener| tokio::spawn(listener.run()));

    info!("Press Ctrl+C to stop");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping listeners...");
        }
        Err(err) => {
            error!("Error listening for shutdown signal: {}", err);
        }
    }

    http_handle.abort();
    if let Some(handle) = https_handle {
        handle.abort();
    }
    info!("Tunnel ingress stopped");

    Ok(())
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}
