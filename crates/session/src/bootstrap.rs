//! Wiring of the session layer from a [`PortalConfig`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use configs::PortalConfig;
use tracing::info;

use crate::auth::service::{AuthPaths, AuthService};
use crate::context::SessionContext;
use crate::gateway::{ApiGateway, GatewayConfig, HttpTransport, ReqwestTransport};
use crate::initializer::{InitOutcome, SessionInitializer};
use crate::search_cache::SearchCacheConfig;
use crate::token_store::TokenStore;

/// Everything a front end needs to talk to the billing backend.
pub struct Portal {
    pub context: Arc<SessionContext>,
    pub store: TokenStore,
    pub gateway: Arc<ApiGateway>,
    pub auth: Arc<AuthService>,
    pub initializer: SessionInitializer,
    pub search_cache: SearchCacheConfig,
}

impl Portal {
    /// Build the session stack over the production `reqwest` transport.
    pub async fn bootstrap(cfg: &PortalConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(
            &cfg.api.base_url,
            cfg.api.connect_timeout(),
            cfg.api.request_timeout(),
        )
        .context("building HTTP client")?;
        Self::with_transport(cfg, Arc::new(transport)).await
    }

    /// Build the session stack over any transport.
    pub async fn with_transport(
        cfg: &PortalConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> anyhow::Result<Self> {
        let session_file = Path::new(&cfg.storage.session_file);
        common::env::ensure_parent_dir(session_file).await?;
        let store = TokenStore::open(session_file).await;

        let context = Arc::new(SessionContext::new());
        let gateway = Arc::new(ApiGateway::new(
            transport,
            store.clone(),
            context.clone(),
            GatewayConfig::from(&cfg.auth),
        ));
        let auth = Arc::new(AuthService::new(gateway.clone(), AuthPaths::from(&cfg.auth)));
        let initializer = SessionInitializer::new(
            gateway.clone(),
            cfg.api.probe_path.as_str(),
            cfg.api.probe_timeout(),
        );

        info!(
            base_url = %cfg.api.base_url,
            persistent = store.is_persistent(),
            single_flight = cfg.auth.single_flight_refresh,
            "session layer ready"
        );
        Ok(Self {
            context,
            store,
            gateway,
            auth,
            initializer,
            search_cache: SearchCacheConfig::from(&cfg.cache),
        })
    }

    /// Run the startup sequence.
    pub async fn init(&self) -> InitOutcome {
        self.initializer.run().await
    }
}
