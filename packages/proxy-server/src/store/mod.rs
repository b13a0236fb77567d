//! `KeyStore`: the process-serialized interface over a durable capability
//! record store (§4.1).
//!
//! `KeyStore` is object-safe (`Arc<dyn KeyStore>`), following the
//! `ServerStorage`/`RecordStore` trait-object pattern the rest of this
//! codebase's storage layer was built on. [`memory::MemoryKeyStore`] is the
//! default, single-mutex implementation; [`postgres::PostgresKeyStore`]
//! (feature `postgres`) backs the same trait with one transaction per
//! operation instead.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sweep;

use std::collections::BTreeSet;

use async_trait::async_trait;
use proxy_core::method::Method;
use proxy_core::CoreError;
use proxy_core::KeyRecord;

/// Result of a single atomic method-permission read (§4.1
/// `read_endpoint_method`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodView {
    pub path: String,
    pub permitted: bool,
}

/// Result of the Put-specific read (§4.1 `read_put_view`): permission plus
/// everything the Request Authorizer needs to classify a Put body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutView {
    pub path: String,
    pub permitted: bool,
    pub put_count: i64,
    pub max_put: i64,
    pub put_types: BTreeSet<String>,
    pub max_put_size: i64,
}

/// Result of a counter-gated read shared by Mkcol and Get (§4.1
/// `read_mkcol_view` / `read_get_view`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterView {
    pub path: String,
    pub permitted: bool,
    pub count: i64,
    pub max: i64,
}

/// A process-serialized interface over a durable capability record store.
///
/// Every method here is expected to evaluate expiry lazily: if the key is
/// expired at the time of the call, implementations delete the record and
/// return [`CoreError::KeyExpired`] instead of performing the requested
/// read (§4.2, §8 P4).
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fails with [`CoreError::DuplicateKey`] if `key_value` collides.
    async fn insert(&self, record: KeyRecord) -> Result<(), CoreError>;

    /// Returns the full record, or [`CoreError::NotFound`]. Evaluates expiry
    /// against `now_millis` first (§4.2), deleting and returning
    /// [`CoreError::KeyExpired`] if it has lapsed.
    async fn get(&self, key_value: &str, now_millis: i64) -> Result<KeyRecord, CoreError>;

    /// Idempotent; absence is not an error.
    async fn delete(&self, key_value: &str);

    /// A single atomic read of the permission and path for `method` on
    /// `endpoint_name` under `key_value`.
    async fn read_endpoint_method(
        &self,
        key_value: &str,
        endpoint_name: &str,
        method: Method,
        now_millis: i64,
    ) -> Result<MethodView, CoreError>;

    async fn read_put_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<PutView, CoreError>;

    async fn read_mkcol_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<CounterView, CoreError>;

    async fn read_get_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<CounterView, CoreError>;

    /// Atomically increments the counter for `method` on `endpoint_name`,
    /// and — if `initiate_expire` names this method and the clock has not
    /// started — latches `expire_started`/`expire_start_time` in the same
    /// operation (§4.1, §4.2).
    async fn increment_counter(&self, key_value: &str, endpoint_name: &str, method: Method, now_millis: i64) -> Result<(), CoreError>;

    /// A finite, non-restartable snapshot of every stored record not
    /// expired as of `now_millis` (§3 I8). Used only by descendant
    /// enumeration.
    async fn scan(&self, now_millis: i64) -> Vec<KeyRecord>;

    /// Removes every record expired as of `now_millis`. Returns the count
    /// removed.
    async fn sweep_expired(&self, now_millis: i64) -> usize;
}
