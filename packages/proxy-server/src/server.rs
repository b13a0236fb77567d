//! Server lifecycle: builds the key store, seeds the admin key, spawns the
//! background expiry sweep, and serves the HTTP surface. Mirrors the
//! teacher workspace's `NetworkModule` deferred-startup shape, collapsed to
//! this crate's simpler single-listener needs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proxy_core::types::{Endpoint, InitiateExpire, KeyRecord};
use proxy_core::CoreError;
use reqwest::{Client, Url};

use crate::config::ServerConfig;
use crate::handlers::{build_router, now_millis, AppState};
use crate::proxy::ProxyEngine;
use crate::store::memory::MemoryKeyStore;
use crate::store::KeyStore;

pub struct ServerModule {
    config: Arc<ServerConfig>,
    store: Arc<dyn KeyStore>,
}

impl ServerModule {
    /// Builds the key store and seeds the admin key if it is not already
    /// present (scenario 1, §8).
    pub async fn bootstrap(config: ServerConfig) -> anyhow::Result<Self> {
        let store = build_store(&config).await?;
        seed_admin_key(store.as_ref(), &config.admin_key).await?;
        Ok(Self { config: Arc::new(config), store })
    }

    /// Assembles the router and serves it on `config.bind_addr` until
    /// `shutdown` resolves. Spawns the periodic expiry sweep alongside it.
    pub async fn serve(self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let sweep_store = Arc::clone(&self.store);
        let sweep_interval = self.config.sweep_interval();
        tokio::spawn(async move {
            crate::store::sweep::run(sweep_store, sweep_interval).await;
        });

        let file_upstream = Url::parse(&self.config.file_upstream)?;
        let admin_upstream = Url::parse(&self.config.admin_upstream)?;

        let state = AppState {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            file_proxy: Arc::new(ProxyEngine::new(Client::new(), file_upstream)),
            admin_proxy: Arc::new(ProxyEngine::new(Client::new(), admin_upstream)),
        };

        let router = build_router(state);
        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "listening");
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }
}

async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn KeyStore>> {
    if config.database_url.is_empty() {
        return Ok(Arc::new(MemoryKeyStore::new()));
    }

    #[cfg(feature = "postgres")]
    {
        let store = crate::store::postgres::PostgresKeyStore::connect(&config.database_url).await?;
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "postgres"))]
    {
        anyhow::bail!("DATABASE_URL is set but this binary was built without the `postgres` feature")
    }
}

/// Seeds the bootstrap admin key if absent: one endpoint `root` at `/` with
/// every permission granted and no expiry. A second startup against an
/// already-seeded store logs and does nothing further (scenario 1, §8).
async fn seed_admin_key(store: &dyn KeyStore, admin_key: &str) -> anyhow::Result<()> {
    match store.get(admin_key, now_millis()).await {
        Ok(_) => {
            tracing::info!("admin already exists");
            Ok(())
        }
        Err(CoreError::NotFound | CoreError::KeyExpired) => match store.insert(admin_record(admin_key)).await {
            Ok(()) | Err(CoreError::DuplicateKey) => Ok(()),
            Err(err) => Err(anyhow::anyhow!(err)),
        },
        Err(err) => Err(anyhow::anyhow!(err)),
    }
}

fn admin_record(admin_key: &str) -> KeyRecord {
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "root".to_string(),
        Endpoint {
            path: "/".to_string(),
            copy: true,
            del: true,
            get: true,
            head: true,
            lock: true,
            mkcol: true,
            options: true,
            post: true,
            propfind: true,
            put: true,
            trace: true,
            unlock: true,
            get_count: 0,
            max_get: i64::MAX,
            put_count: 0,
            max_put: i64::MAX,
            mkcol_count: 0,
            max_mkcol: i64::MAX,
            max_put_size: i64::MAX,
            put_types: BTreeSet::from(["any".to_string()]),
        },
    );
    KeyRecord {
        key_value: admin_key.to_string(),
        can_create_child: true,
        endpoints,
        initiate_expire: InitiateExpire::Never,
        expire_delta: InitiateExpire::NEVER_DELTA,
        expire_started: false,
        expire_start_time: 0,
    }
}
