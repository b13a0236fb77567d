//! Authorizing reverse proxy: the HTTP surface, key store, and proxy engine
//! built on top of `proxy-core`'s pure capability algebra.
//!
//! - **Config** ([`config`]): CLI/env process configuration
//! - **Store** ([`store`]): the `KeyStore` trait and its memory/Postgres
//!   implementations, plus the background expiry sweep
//! - **Authorize** ([`authorize`]): the Request Authorizer (§4.4)
//! - **Proxy** ([`proxy`]): the Proxy Engine that forwards and post-processes
//!   authorized requests (§4.5)
//! - **Handlers** ([`handlers`]): axum handlers and router assembly (§4.6, §6)
//! - **Server** ([`server`]): process bootstrap — store construction, admin
//!   key seeding, and serving

pub mod authorize;
pub mod config;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod server;
pub mod store;

pub use config::ServerConfig;
pub use error::ApiError;
pub use handlers::AppState;
pub use server::ServerModule;
