//! `Session`: the façade that routes requests to per-endpoint pools.

use std::collections::HashMap;
use std::sync::Arc;

use rustls::ClientConfig;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::SessionConfig;
use crate::connection::stream::default_tls_config;
use crate::endpoint::EndpointKey;
use crate::error::Result;
use crate::pool::Pool;
use crate::request::HttpRequest;
use crate::response::Response;

/// Owns one `Pool` per distinct endpoint a caller has talked to, each
/// bounded to the same `conn_limit`.
pub struct Session {
    conn_limit: usize,
    config: SessionConfig,
    tls_config: Arc<ClientConfig>,
    pools: RwLock<HashMap<EndpointKey, Arc<Pool>>>,
}

impl Session {
    /// Creates a Session whose pools each allow up to `conn_limit`
    /// concurrently leased connections.
    pub fn new(conn_limit: usize) -> Self {
        Self::with_config(conn_limit, SessionConfig::default())
    }

    pub fn with_config(conn_limit: usize, config: SessionConfig) -> Self {
        assert!(conn_limit > 0, "conn_limit must be nonzero");
        Self {
            conn_limit,
            config,
            tls_config: default_tls_config(),
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Issues one request and returns its fully materialized response.
    ///
    /// `url` must be an absolute `http://` or `https://` URL; its
    /// scheme/host/port select (and, if necessary, create) the `Pool` this
    /// request leases a `Connection` from.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Option<&[(&str, &str)]>,
    ) -> Result<Response> {
        let target = EndpointKey::parse(url)?;
        let pool = self.pool_for(&target.endpoint).await;
        let connection = pool.acquire().await?;

        HttpRequest::new(
            connection,
            &target.endpoint,
            &target.path_and_query,
            method,
            headers.unwrap_or(&[]),
            &self.config,
        )
        .drive()
        .await
    }

    /// Total number of connections ever opened across every pool this
    /// Session owns (see `Pool::stats`).
    pub async fn connections(&self) -> usize {
        let mut total = 0;
        for pool in self.pools.read().await.values() {
            total += pool.stats().await;
        }
        total
    }

    async fn pool_for(&self, endpoint: &EndpointKey) -> Arc<Pool> {
        if let Some(pool) = self.pools.read().await.get(endpoint) {
            return pool.clone();
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(endpoint) {
            return pool.clone();
        }

        let tls_config = endpoint.scheme().is_tls().then(|| self.tls_config.clone());
        let pool = Arc::new(Pool::new(endpoint.clone(), self.conn_limit, tls_config));
        debug!(endpoint = %endpoint, "registered new pool");
        pools.insert(endpoint.clone(), pool.clone());
        pool
    }
}
