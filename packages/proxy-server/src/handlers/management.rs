//! `/addKey`, `/getKey`, `/deleteKey`, `/getChildKeys` (§4.6): minting a
//! child key, fetching or deleting the caller's own key, and enumerating
//! descendants.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::body::Bytes;
use proxy_core::types::{ChildKeyDeclaration, KeyRecord};
use proxy_core::{algebra, CoreError};

use crate::authorize::parse_basic_auth;
use crate::error::ApiError;
use crate::handlers::{now_millis, AppState};

/// Replaces every endpoint `path` with the endpoint's own name — the
/// `/addKey` response confidentiality rule (§4.6, P6).
fn mask_paths_with_endpoint_name(mut record: KeyRecord) -> KeyRecord {
    for (name, endpoint) in &mut record.endpoints {
        endpoint.path = name.clone();
    }
    record
}

/// Replaces every endpoint `path` with `"/"` — the `/getKey` response
/// confidentiality rule (§4.6, P6).
fn mask_paths_with_root(mut record: KeyRecord) -> KeyRecord {
    for endpoint in record.endpoints.values_mut() {
        endpoint.path = "/".to_string();
    }
    record
}

async fn resolve_caller(state: &AppState, headers: &HeaderMap, now_millis: i64) -> Result<KeyRecord, ApiError> {
    let key_value = parse_basic_auth(headers).map_err(ApiError::from_core)?;
    state.store.get(&key_value, now_millis).await.map_err(ApiError::from_core)
}

/// `POST /addKey`: validates the declared child against the caller's own
/// record (§4.3 `validate_child`) and, if it dominates, mints and stores it.
pub async fn add_key_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let now = now_millis();
    let parent = match resolve_caller(&state, &headers, now).await {
        Ok(record) => record,
        Err(err) => return err.into_response(),
    };

    let declaration: ChildKeyDeclaration = match serde_json::from_slice(&body) {
        Ok(decl) => decl,
        Err(err) => return ApiError::BadRequest(err.to_string()).into_response(),
    };

    let child = match algebra::validate_child(&declaration, &parent, now) {
        Ok(child) => child,
        Err(err) => return ApiError::from_core(err).into_response(),
    };

    if let Err(err) = state.store.insert(child.clone()).await {
        return ApiError::from_core(err).into_response();
    }

    (StatusCode::CREATED, Json(mask_paths_with_endpoint_name(child))).into_response()
}

/// `GET /getKey`: the caller's own record, with every endpoint path masked
/// to `"/"`. Spec-preserved oddity: this returns `201`, not the more
/// conventional `200` (§9).
pub async fn get_key_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let now = now_millis();
    match resolve_caller(&state, &headers, now).await {
        Ok(record) => (StatusCode::CREATED, Json(mask_paths_with_root(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `DELETE /deleteKey`: deletes the caller's own key. Idempotent, matching
/// [`crate::store::KeyStore::delete`].
pub async fn delete_key_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let now = now_millis();
    let key_value = match parse_basic_auth(&headers) {
        Ok(key) => key,
        Err(err) => return ApiError::from_core(err).into_response(),
    };
    // A delete of an already-expired key still needs a live read first so
    // an expired key gets swept (§4.2) instead of silently no-oping twice.
    let _ = state.store.get(&key_value, now).await;
    state.store.delete(&key_value).await;
    StatusCode::OK.into_response()
}

/// `GET /getChildKeys`: enumerates every stored descendant of the caller's
/// key (§4.3 descendant enumeration).
pub async fn get_child_keys_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let now = now_millis();
    let parent = match resolve_caller(&state, &headers, now).await {
        Ok(record) => record,
        Err(err) => return err.into_response(),
    };

    let records = state.store.scan(now).await;
    let descendants = algebra::enumerate_descendants(&parent, records.iter());
    Json(descendants).into_response()
}
