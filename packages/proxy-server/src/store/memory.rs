//! The default `KeyStore`: a single `parking_lot::Mutex` guarding a
//! `HashMap`. One mutex over every operation reproduces the "coarse-grained
//! lock... correctness aid, not a bottleneck by design" note of §9 exactly —
//! it is what makes the compound reads and the counter-plus-expiry-start
//! write atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use proxy_core::method::Method;
use proxy_core::{algebra, expiry, CoreError, KeyRecord};

use super::{CounterView, KeyStore, MethodView, PutView};

#[derive(Default)]
pub struct MemoryKeyStore {
    records: Mutex<HashMap<String, KeyRecord>>,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns a mutable reference to the live (non-expired) record, deleting
/// and returning `KeyExpired` if it has lapsed. Every public method on this
/// store funnels through here so expiry is evaluated on every access (§4.2).
fn live_record_mut<'a>(map: &'a mut HashMap<String, KeyRecord>, key_value: &str, now_millis: i64) -> Result<&'a mut KeyRecord, CoreError> {
    let expired = match map.get(key_value) {
        None => return Err(CoreError::NotFound),
        Some(record) => record.is_expired_at(now_millis),
    };
    if expired {
        map.remove(key_value);
        return Err(CoreError::KeyExpired);
    }
    Ok(map.get_mut(key_value).expect("presence checked above"))
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn insert(&self, record: KeyRecord) -> Result<(), CoreError> {
        let mut guard = self.records.lock();
        if guard.contains_key(&record.key_value) {
            return Err(CoreError::DuplicateKey);
        }
        guard.insert(record.key_value.clone(), record);
        Ok(())
    }

    async fn get(&self, key_value: &str, now_millis: i64) -> Result<KeyRecord, CoreError> {
        let mut guard = self.records.lock();
        live_record_mut(&mut guard, key_value, now_millis).map(|r| r.clone())
    }

    async fn delete(&self, key_value: &str) {
        self.records.lock().remove(key_value);
    }

    async fn read_endpoint_method(&self, key_value: &str, endpoint_name: &str, method: Method, now_millis: i64) -> Result<MethodView, CoreError> {
        let mut guard = self.records.lock();
        let record = live_record_mut(&mut guard, key_value, now_millis)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        let permitted = algebra::permission_flag(endpoint, method).unwrap_or(false);
        Ok(MethodView { path: endpoint.path.clone(), permitted })
    }

    async fn read_put_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<PutView, CoreError> {
        let mut guard = self.records.lock();
        let record = live_record_mut(&mut guard, key_value, now_millis)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        Ok(PutView {
            path: endpoint.path.clone(),
            permitted: endpoint.put,
            put_count: endpoint.put_count,
            max_put: endpoint.max_put,
            put_types: endpoint.put_types.clone(),
            max_put_size: endpoint.max_put_size,
        })
    }

    async fn read_mkcol_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<CounterView, CoreError> {
        let mut guard = self.records.lock();
        let record = live_record_mut(&mut guard, key_value, now_millis)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        Ok(CounterView { path: endpoint.path.clone(), permitted: endpoint.mkcol, count: endpoint.mkcol_count, max: endpoint.max_mkcol })
    }

    async fn read_get_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<CounterView, CoreError> {
        let mut guard = self.records.lock();
        let record = live_record_mut(&mut guard, key_value, now_millis)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        Ok(CounterView { path: endpoint.path.clone(), permitted: endpoint.get, count: endpoint.get_count, max: endpoint.max_get })
    }

    async fn increment_counter(&self, key_value: &str, endpoint_name: &str, method: Method, now_millis: i64) -> Result<(), CoreError> {
        let mut guard = self.records.lock();
        let record = live_record_mut(&mut guard, key_value, now_millis)?;

        if expiry::should_start_on_method(record.initiate_expire, method, record.expire_started) {
            record.expire_started = true;
            record.expire_start_time = now_millis;
        }

        let endpoint = record.endpoints.get_mut(endpoint_name).ok_or(CoreError::Unauthorized)?;
        match method {
            Method::Put => endpoint.put_count += 1,
            Method::Get => endpoint.get_count += 1,
            Method::Mkcol => endpoint.mkcol_count += 1,
            other => return Err(CoreError::Internal(format!("increment_counter called for non-counted method {other}"))),
        }
        Ok(())
    }

    async fn scan(&self, now_millis: i64) -> Vec<KeyRecord> {
        self.records
            .lock()
            .values()
            .filter(|record| !record.is_expired_at(now_millis))
            .cloned()
            .collect()
    }

    async fn sweep_expired(&self, now_millis: i64) -> usize {
        let mut guard = self.records.lock();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, record)| record.is_expired_at(now_millis))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            guard.remove(key);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxy_core::types::InitiateExpire;
    use std::collections::BTreeMap;

    fn sample_record(key_value: &str, expire_delta: i64, initiate: InitiateExpire) -> KeyRecord {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            "root".to_string(),
            proxy_core::types::Endpoint {
                path: "/".to_string(),
                copy: false,
                del: false,
                get: true,
                head: false,
                lock: false,
                mkcol: true,
                options: false,
                post: false,
                propfind: false,
                put: true,
                trace: false,
                unlock: false,
                get_count: 0,
                max_get: 100,
                put_count: 0,
                max_put: 5,
                mkcol_count: 0,
                max_mkcol: 100,
                max_put_size: 1_000_000,
                put_types: std::collections::BTreeSet::from(["any".to_string()]),
            },
        );
        let (expire_started, expire_start_time) = proxy_core::expiry::initial_state(initiate, 0);
        KeyRecord { key_value: key_value.to_string(), can_create_child: true, endpoints, initiate_expire: initiate, expire_delta, expire_started, expire_start_time }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = MemoryKeyStore::new();
        let record = sample_record("k1", 1000, InitiateExpire::Creation);
        store.insert(record.clone()).await.unwrap();
        let fetched = store.get("k1", 0).await.unwrap();
        assert_eq!(fetched.key_value, "k1");
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let store = MemoryKeyStore::new();
        store.insert(sample_record("k1", 1000, InitiateExpire::Never)).await.unwrap();
        let err = store.insert(sample_record("k1", 1000, InitiateExpire::Never)).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey));
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = MemoryKeyStore::new();
        assert!(matches!(store.get("missing", 0).await.unwrap_err(), CoreError::NotFound));
    }

    #[tokio::test]
    async fn put_quota_and_expiry_latch_on_increment() {
        let store = MemoryKeyStore::new();
        store.insert(sample_record("k1", 1000, InitiateExpire::Put)).await.unwrap();

        let view = store.read_put_view("k1", "root", 0).await.unwrap();
        assert!(view.permitted);
        assert_eq!(view.put_count, 0);

        store.increment_counter("k1", "root", Method::Put, 500).await.unwrap();

        let record = store.get("k1", 0).await.unwrap();
        assert!(record.expire_started);
        assert_eq!(record.expire_start_time, 500);
        assert_eq!(record.endpoints["root"].put_count, 1);

        // Latches once: a second increment must not move expire_start_time.
        store.increment_counter("k1", "root", Method::Put, 900).await.unwrap();
        let record = store.get("k1", 0).await.unwrap();
        assert_eq!(record.expire_start_time, 500);
        assert_eq!(record.endpoints["root"].put_count, 2);
    }

    #[tokio::test]
    async fn expired_key_is_deleted_on_access() {
        let store = MemoryKeyStore::new();
        store.insert(sample_record("k1", 1, InitiateExpire::Creation)).await.unwrap();

        let err = store.read_endpoint_method("k1", "root", Method::Get, 100).await.unwrap_err();
        assert!(matches!(err, CoreError::KeyExpired));

        assert!(matches!(store.get("k1", 0).await.unwrap_err(), CoreError::NotFound));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_records() {
        let store = MemoryKeyStore::new();
        store.insert(sample_record("fresh", 1000, InitiateExpire::Creation)).await.unwrap();
        store.insert(sample_record("stale", 1, InitiateExpire::Creation)).await.unwrap();

        let removed = store.sweep_expired(100).await;
        assert_eq!(removed, 1);
        assert!(store.get("fresh", 0).await.is_ok());
        assert!(store.get("stale", 0).await.is_err());
    }

    #[tokio::test]
    async fn unknown_endpoint_is_unauthorized() {
        let store = MemoryKeyStore::new();
        store.insert(sample_record("k1", 1000, InitiateExpire::Never)).await.unwrap();
        let err = store.read_endpoint_method("k1", "nope", Method::Get, 0).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }
}
