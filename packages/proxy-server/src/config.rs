//! Process configuration: bind address, upstream URLs, the admin key, and
//! the ambient CORS/timeout/sweep knobs.
//!
//! Built from a `clap` CLI with environment-variable fallback, the way the
//! teacher workspace bootstraps its own `ServerConfig`/`NetworkConfig`
//! pair — the admin key is threaded through here rather than read with a
//! bare `std::env::var` deep inside a handler (the "Ambient process state"
//! item this config resolves).

use std::time::Duration;

use clap::Parser;

/// Top-level server configuration, parsed from CLI flags with environment
/// variable fallback (`clap`'s `env` feature).
#[derive(Debug, Clone, Parser)]
#[command(name = "proxy-server", about = "Authorizing reverse proxy in front of a WebDAV-style file service")]
pub struct ServerConfig {
    /// Bind address for the inbound HTTP surface.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// The admin key secret seeded at startup.
    #[arg(long, env = "ADMINKEY")]
    pub admin_key: String,

    /// Connection string to the record store. Only consulted when built
    /// with the `postgres` feature; ignored by the in-memory store.
    #[arg(long, env = "DATABASE_URL", default_value = "")]
    pub database_url: String,

    /// Upstream origin serving actual WebDAV semantics for `/files/*`.
    #[arg(long, env = "FILE_UPSTREAM", default_value = "http://localhost:8081")]
    pub file_upstream: String,

    /// Upstream origin for `/admin/*`.
    #[arg(long, env = "ADMIN_UPSTREAM", default_value = "http://localhost:8082")]
    pub admin_upstream: String,

    /// Allowed CORS origins. `"*"` allows any origin (the spec calls for
    /// permissive CORS).
    #[arg(long, env = "CORS_ORIGINS", default_value = "*", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Maximum time to wait for a request (inbound read + upstream
    /// round-trip) to complete, in milliseconds.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Interval between expiry sweeps, in seconds. The spec calls for a
    /// 5-hour tick; overridable for tests.
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 5 * 3600)]
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// A config suitable for tests: a fixed admin key, no real upstreams.
    #[must_use]
    pub fn for_test(admin_key: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            admin_key: admin_key.into(),
            database_url: String::new(),
            file_upstream: "http://127.0.0.1:0".to_string(),
            admin_upstream: "http://127.0.0.1:0".to_string(),
            cors_origins: vec!["*".to_string()],
            request_timeout_ms: 30_000,
            sweep_interval_secs: 5 * 3600,
        }
    }
}
