//! Shared application state.
//!
//! Built once at startup and handed to every handler and middleware through
//! axum state; the provider clients are explicit fields, never globals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::GatewayConfig;
use crate::provider::{IdentityProvider, ProfileStore, SupabaseClient};
use crate::routes::RouteTable;
use crate::session_cookie::SessionCookies;

#[derive(Clone)]
pub struct GateState {
    pub config: Arc<GatewayConfig>,
    pub routes: RouteTable,
    pub cookies: SessionCookies,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    /// Client for the upstream dashboard renderer
    pub upstream: reqwest::Client,
    pub start_time: Instant,
}

impl GateState {
    pub fn new(
        config: GatewayConfig,
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let upstream = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            routes: RouteTable::from_config(&config.gate),
            cookies: SessionCookies::from_config(&config),
            config: Arc::new(config),
            identity,
            profiles,
            upstream,
            start_time: Instant::now(),
        }
    }

    /// State backed by the hosted provider named in `config.provider`.
    pub fn from_config(config: GatewayConfig) -> Self {
        let client = Arc::new(SupabaseClient::new(&config.provider));
        Self::new(config, client.clone(), client)
    }

    /// Time budget for a single provider lookup made by the gate.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.config.gate.lookup_timeout_ms)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
