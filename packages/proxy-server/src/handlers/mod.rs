//! HTTP handler definitions for the authorizing reverse proxy.
//!
//! This module defines [`AppState`] (the shared state carried through axum
//! extractors) and re-exports the handlers, the same grouping the teacher
//! workspace's own `network::handlers` module uses.

pub mod admin;
pub mod files;
pub mod health;
pub mod management;

pub use admin::admin_proxy_handler;
pub use files::files_handler;
pub use health::healthz_handler;
pub use management::{add_key_handler, delete_key_handler, get_child_keys_handler, get_key_handler};

use std::sync::Arc;

use axum::routing::{any, delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::proxy::ProxyEngine;
use crate::store::KeyStore;

/// Shared application state passed to every axum handler via `State`
/// extraction. Cheap to clone — everything behind it is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyStore>,
    pub config: Arc<ServerConfig>,
    pub file_proxy: Arc<ProxyEngine>,
    pub admin_proxy: Arc<ProxyEngine>,
}

/// Current time in milliseconds since the Unix epoch, the clock every
/// authorize/store call is evaluated against.
pub fn now_millis() -> i64 {
    i64::try_from(
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis(),
    )
    .unwrap_or(i64::MAX)
}

/// Assembles the full axum router (§6): the `/files/*` proxy surface, the
/// management endpoints, the admin proxy, and the ambient `/healthz` probe.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let timeout = state.config.request_timeout();

    Router::new()
        .route("/files/{*rest}", any(files_handler))
        .route("/addKey", post(add_key_handler))
        .route("/getKey", get(get_key_handler))
        .route("/deleteKey", delete(delete_key_handler))
        .route("/getChildKeys", get(get_child_keys_handler))
        .route("/admin/{*rest}", any(admin_proxy_handler))
        .route("/healthz", get(healthz_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

/// Builds the CORS layer the spec calls "permissive" (§6): a wildcard
/// origin list allows any origin, matching the teacher's own
/// `build_cors_layer` convention.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()).collect::<Vec<_>>())
    };

    CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_cors_layer_wildcard_does_not_panic() {
        let _cors = build_cors_layer(&["*".to_string()]);
    }

    #[test]
    fn build_cors_layer_explicit_origins_does_not_panic() {
        let _cors = build_cors_layer(&["https://example.com".to_string()]);
    }
}
