//! `PostgresKeyStore`: the `KeyStore` trait backed by `sqlx`, mirroring the
//! schema this crate's record store was originally built against — scalar
//! columns plus a `JSONB` endpoints column, keyed by `key_value`.
//!
//! Each operation runs inside its own transaction with `SELECT ... FOR
//! UPDATE`, which keeps the compound reads and the counter-plus-expiry
//! write atomic per §5 without needing [`super::memory::MemoryKeyStore`]'s
//! application-level mutex (the alternative §9 explicitly allows).

use std::collections::BTreeMap;

use async_trait::async_trait;
use proxy_core::method::Method;
use proxy_core::types::{Endpoint, InitiateExpire};
use proxy_core::{algebra, expiry, CoreError, KeyRecord};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{CounterView, KeyStore, MethodView, PutView};

const CREATE_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS keys (
    key_value TEXT PRIMARY KEY,
    can_create_child BOOLEAN NOT NULL,
    endpoints JSONB NOT NULL,
    initiate_expire TEXT NOT NULL,
    expire_delta BIGINT NOT NULL,
    expire_started BOOLEAN NOT NULL,
    expire_start_time BIGINT NOT NULL
)";

pub struct PostgresKeyStore {
    pool: PgPool,
}

impl PostgresKeyStore {
    /// Connects and ensures the `keys` table exists.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn internal(err: sqlx::Error) -> CoreError {
    CoreError::Internal(err.to_string())
}

fn decode_row(
    key_value: String,
    can_create_child: bool,
    endpoints: serde_json::Value,
    initiate_expire: String,
    expire_delta: i64,
    expire_started: bool,
    expire_start_time: i64,
) -> Result<KeyRecord, CoreError> {
    let endpoints: BTreeMap<String, Endpoint> =
        serde_json::from_value(endpoints).map_err(|e| CoreError::Internal(format!("decoding endpoints: {e}")))?;
    let initiate_expire = InitiateExpire::from_str_name(&initiate_expire)
        .ok_or_else(|| CoreError::Internal(format!("unknown initiate_expire column value {initiate_expire}")))?;
    Ok(KeyRecord { key_value, can_create_child, endpoints, initiate_expire, expire_delta, expire_started, expire_start_time })
}

async fn fetch_for_update(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, key_value: &str) -> Result<KeyRecord, CoreError> {
    let row = sqlx::query("SELECT key_value, can_create_child, endpoints, initiate_expire, expire_delta, expire_started, expire_start_time FROM keys WHERE key_value = $1 FOR UPDATE")
        .bind(key_value)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal)?
        .ok_or(CoreError::NotFound)?;

    decode_row(
        row.try_get("key_value").map_err(internal)?,
        row.try_get("can_create_child").map_err(internal)?,
        row.try_get("endpoints").map_err(internal)?,
        row.try_get("initiate_expire").map_err(internal)?,
        row.try_get("expire_delta").map_err(internal)?,
        row.try_get("expire_started").map_err(internal)?,
        row.try_get("expire_start_time").map_err(internal)?,
    )
}

/// Fetches the live record inside `tx`, deleting and returning
/// `KeyExpired` if it has lapsed as of `now_millis`. Every read/write below
/// funnels through this so expiry is evaluated on every access.
async fn live_record(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, key_value: &str, now_millis: i64) -> Result<KeyRecord, CoreError> {
    let record = fetch_for_update(tx, key_value).await?;
    if record.is_expired_at(now_millis) {
        sqlx::query("DELETE FROM keys WHERE key_value = $1").bind(key_value).execute(&mut **tx).await.map_err(internal)?;
        return Err(CoreError::KeyExpired);
    }
    Ok(record)
}

#[async_trait]
impl KeyStore for PostgresKeyStore {
    async fn insert(&self, record: KeyRecord) -> Result<(), CoreError> {
        let endpoints_json = serde_json::to_value(&record.endpoints).map_err(|e| CoreError::Internal(e.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO keys (key_value, can_create_child, endpoints, initiate_expire, expire_delta, expire_started, expire_start_time) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.key_value)
        .bind(record.can_create_child)
        .bind(endpoints_json)
        .bind(record.initiate_expire.as_str())
        .bind(record.expire_delta)
        .bind(record.expire_started)
        .bind(record.expire_start_time)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => Err(CoreError::DuplicateKey),
            Err(e) => Err(internal(e)),
        }
    }

    async fn get(&self, key_value: &str, now_millis: i64) -> Result<KeyRecord, CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let record = live_record(&mut tx, key_value, now_millis).await?;
        tx.commit().await.map_err(internal)?;
        Ok(record)
    }

    async fn delete(&self, key_value: &str) {
        let _ = sqlx::query("DELETE FROM keys WHERE key_value = $1").bind(key_value).execute(&self.pool).await;
    }

    async fn read_endpoint_method(&self, key_value: &str, endpoint_name: &str, method: Method, now_millis: i64) -> Result<MethodView, CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let record = live_record(&mut tx, key_value, now_millis).await?;
        tx.commit().await.map_err(internal)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        let permitted = algebra::permission_flag(endpoint, method).unwrap_or(false);
        Ok(MethodView { path: endpoint.path.clone(), permitted })
    }

    async fn read_put_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<PutView, CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let record = live_record(&mut tx, key_value, now_millis).await?;
        tx.commit().await.map_err(internal)?;
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
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let record = live_record(&mut tx, key_value, now_millis).await?;
        tx.commit().await.map_err(internal)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        Ok(CounterView { path: endpoint.path.clone(), permitted: endpoint.mkcol, count: endpoint.mkcol_count, max: endpoint.max_mkcol })
    }

    async fn read_get_view(&self, key_value: &str, endpoint_name: &str, now_millis: i64) -> Result<CounterView, CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let record = live_record(&mut tx, key_value, now_millis).await?;
        tx.commit().await.map_err(internal)?;
        let endpoint = record.endpoints.get(endpoint_name).ok_or(CoreError::Unauthorized)?;
        Ok(CounterView { path: endpoint.path.clone(), permitted: endpoint.get, count: endpoint.get_count, max: endpoint.max_get })
    }

    async fn increment_counter(&self, key_value: &str, endpoint_name: &str, method: Method, now_millis: i64) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let mut record = live_record(&mut tx, key_value, now_millis).await?;

        let should_start = expiry::should_start_on_method(record.initiate_expire, method, record.expire_started);
        if should_start {
            record.expire_started = true;
            record.expire_start_time = now_millis;
        }

        {
            let endpoint = record.endpoints.get_mut(endpoint_name).ok_or(CoreError::Unauthorized)?;
            match method {
                Method::Put => endpoint.put_count += 1,
                Method::Get => endpoint.get_count += 1,
                Method::Mkcol => endpoint.mkcol_count += 1,
                other => return Err(CoreError::Internal(format!("increment_counter called for non-counted method {other}"))),
            }
        }

        let endpoints_json = serde_json::to_value(&record.endpoints).map_err(|e| CoreError::Internal(e.to_string()))?;
        sqlx::query("UPDATE keys SET endpoints = $1, expire_started = $2, expire_start_time = $3 WHERE key_value = $4")
            .bind(endpoints_json)
            .bind(record.expire_started)
            .bind(record.expire_start_time)
            .bind(key_value)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        tx.commit().await.map_err(internal)?;
        Ok(())
    }

    async fn scan(&self, now_millis: i64) -> Vec<KeyRecord> {
        let rows = sqlx::query("SELECT key_value, can_create_child, endpoints, initiate_expire, expire_delta, expire_started, expire_start_time FROM keys")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_default();

        rows.into_iter()
            .filter_map(|row| {
                decode_row(
                    row.try_get("key_value").ok()?,
                    row.try_get("can_create_child").ok()?,
                    row.try_get("endpoints").ok()?,
                    row.try_get("initiate_expire").ok()?,
                    row.try_get("expire_delta").ok()?,
                    row.try_get("expire_started").ok()?,
                    row.try_get("expire_start_time").ok()?,
                )
                .ok()
            })
            .filter(|record: &KeyRecord| !record.is_expired_at(now_millis))
            .collect()
    }

    async fn sweep_expired(&self, now_millis: i64) -> usize {
        let records = self.scan(i64::MIN).await;
        let expired: Vec<String> = records.into_iter().filter(|r| r.is_expired_at(now_millis)).map(|r| r.key_value).collect();
        if expired.is_empty() {
            return 0;
        }
        let removed = sqlx::query("DELETE FROM keys WHERE key_value = ANY($1)")
            .bind(&expired)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected())
            .unwrap_or(0);
        removed as usize
    }
}
