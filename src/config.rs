//! Static tunnel table
//!
//! Tunnels are declared up front in a YAML file:
//!
//! ```yaml
//! tunnels:
//!   - url: http://app.example.com
//!     forward: 127.0.0.1:3000
//!   - url: https://admin.example.com
//!     forward: 127.0.0.1:4000
//!     http_auth: "Basic YWRtaW46aHVudGVyMg=="
//! ```

use anyhow::{Context, Result};
use ingress_router::{RouteKey, RouteRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::forward::ForwardTunnel;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TunnelsConfig {
    #[serde(default)]
    pub tunnels: Vec<TunnelEntry>,
}

/// One public URL and the backend it forwards to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelEntry {
    /// `http://host` or `https://host`
    pub url: String,

    /// Backend address (`host:port`)
    pub forward: String,

    /// Exact `Authorization` header value required, empty for none
    #[serde(default)]
    pub http_auth: String,
}

impl TunnelsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tunnels file: {:?}", path))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: TunnelsConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML tunnels file")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for tunnel in &self.tunnels {
            let key = RouteKey::parse(&tunnel.url)
                .with_context(|| format!("Invalid tunnel url '{}'", tunnel.url))?;

            if !seen.insert(key) {
                anyhow::bail!("Duplicate tunnel url: {}", tunnel.url);
            }

            if tunnel.forward.trim().is_empty() {
                anyhow::bail!("Tunnel '{}' has no forward address", tunnel.url);
            }
        }

        Ok(())
    }

    /// Register a forwarding tunnel for every entry
    pub fn build_registry(&self) -> Result<Arc<RouteRegistry>> {
        let registry = Arc::new(RouteRegistry::new());

        for tunnel in &self.tunnels {
            let key = RouteKey::parse(&tunnel.url)?;
            info!(
                "Tunnel {} -> {}{}",
                key,
                tunnel.forward,
                if tunnel.http_auth.is_empty() {
                    ""
                } else {
                    " (auth required)"
                }
            );
            let handle = ForwardTunnel::new(tunnel.forward.clone(), tunnel.http_auth.clone());
            registry.register(key, Arc::new(handle))?;
        }

        Ok(registry)
    }
}
