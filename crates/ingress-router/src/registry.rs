//! Tunnel registry: lookup capability plus an in-memory implementation

use crate::{RouteKey, TunnelHandle};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Route registry errors
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Route not found: {0}")]
    RouteNotFound(RouteKey),

    #[error("Route already exists: {0}")]
    RouteAlreadyExists(RouteKey),

    #[error("Invalid route key: {0}")]
    InvalidRouteKey(String),
}

/// Lookup capability the dispatcher is built with.
///
/// Must be safe to call from any number of connection tasks at once. The
/// result reflects the registry state at call time, nothing more.
pub trait TunnelRegistry: Send + Sync {
    fn lookup(&self, key: &RouteKey) -> Option<Arc<dyn TunnelHandle>>;
}

/// In-memory tunnel registry keyed by exact route key
pub struct RouteRegistry {
    routes: DashMap<RouteKey, Arc<dyn TunnelHandle>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }

    /// Register a tunnel under `key`
    pub fn register(&self, key: RouteKey, tunnel: Arc<dyn TunnelHandle>) -> Result<(), RouteError> {
        match self.routes.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(RouteError::RouteAlreadyExists(entry.key().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                trace!("Registering tunnel route {}", entry.key());
                entry.insert(tunnel);
                Ok(())
            }
        }
    }

    /// Remove the tunnel registered under `key`
    pub fn unregister(&self, key: &RouteKey) -> Result<Arc<dyn TunnelHandle>, RouteError> {
        self.routes
            .remove(key)
            .map(|(_, tunnel)| tunnel)
            .ok_or_else(|| RouteError::RouteNotFound(key.clone()))
    }

    pub fn exists(&self, key: &RouteKey) -> bool {
        self.routes.contains_key(key)
    }

    /// All registered route keys, in no particular order
    pub fn keys(&self) -> Vec<RouteKey> {
        self.routes.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TunnelRegistry for RouteRegistry {
    fn lookup(&self, key: &RouteKey) -> Option<Arc<dyn TunnelHandle>> {
        let found = self.routes.get(key).map(|entry| entry.value().clone());
        trace!("Route lookup {} -> {}", key, found.is_some());
        found
    }
}
