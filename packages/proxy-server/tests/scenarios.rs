//! The six numbered scenarios of `spec.md` §8, driven end-to-end through the
//! real axum router (via `tower::ServiceExt::oneshot`, no bound socket
//! needed) with `wiremock` standing in for the upstream file origin.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use proxy_core::types::{Endpoint, InitiateExpire, KeyRecord};
use proxy_server::config::ServerConfig;
use proxy_server::handlers::{build_router, AppState};
use proxy_server::proxy::ProxyEngine;
use proxy_server::store::memory::MemoryKeyStore;
use proxy_server::store::KeyStore;

const ADMIN_KEY: &str = "scenario-admin-secret";
const PNG_BODY: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Hand-rolled standard base64, since this crate carries no base64
/// dependency (the Basic-auth decoder on the server side is
/// `axum_extra::headers`, not a standalone base64 crate).
fn base64_encode(input: &str) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let bytes = input.as_bytes();
    let mut out = String::new();
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 { TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { TABLE[(b2 & 0x3f) as usize] as char } else { '=' });
    }
    out
}

fn basic_auth(key: &str) -> String {
    format!("Basic {}", base64_encode(&format!("_:{key}")))
}

fn admin_record() -> KeyRecord {
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
            max_put: 10,
            mkcol_count: 0,
            max_mkcol: i64::MAX,
            max_put_size: i64::MAX,
            put_types: BTreeSet::from(["any".to_string()]),
        },
    );
    KeyRecord {
        key_value: ADMIN_KEY.to_string(),
        can_create_child: true,
        endpoints,
        initiate_expire: InitiateExpire::Never,
        expire_delta: InitiateExpire::NEVER_DELTA,
        expire_started: false,
        expire_start_time: 0,
    }
}

async fn test_router(store: Arc<MemoryKeyStore>, file_upstream: &MockServer) -> axum::Router {
    let config = Arc::new(ServerConfig::for_test(ADMIN_KEY));
    let file_proxy = Arc::new(ProxyEngine::new(reqwest::Client::new(), file_upstream.uri().parse().expect("valid mock uri")));
    let admin_proxy = Arc::new(ProxyEngine::new(reqwest::Client::new(), "http://127.0.0.1:1".parse().expect("valid placeholder uri")));
    let state = AppState { store: store as Arc<dyn KeyStore>, config, file_proxy, admin_proxy };
    build_router(state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("collect body");
    serde_json::from_slice(&bytes).expect("valid json")
}

/// Scenario 1: a fresh store seeded the way `server::seed_admin_key` seeds
/// it returns an all-permitted root endpoint through `/getKey`, masked to
/// `"/"`.
#[tokio::test]
async fn scenario_1_admin_bootstrap_get_key_masks_path_to_root() {
    let store = Arc::new(MemoryKeyStore::new());
    store.insert(admin_record()).await.expect("seed admin");
    let upstream = MockServer::start().await;
    let router = test_router(Arc::clone(&store), &upstream).await;

    let request = Request::builder().method("GET").uri("/getKey").header("authorization", basic_auth(ADMIN_KEY)).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["endpoints"]["root"]["path"], "/");
    assert_eq!(body["endpoints"]["root"]["get"], true);
}

/// Scenarios 2 and 3: minting a child endpoint under the admin key, then
/// exhausting its Put quota while its `Put`-triggered expiry clock latches.
#[tokio::test]
async fn scenario_2_and_3_child_derivation_then_put_quota() {
    let store = Arc::new(MemoryKeyStore::new());
    store.insert(admin_record()).await.expect("seed admin");
    let upstream = MockServer::start().await;
    Mock::given(method("PUT")).and(path("/pictures/x.png")).respond_with(ResponseTemplate::new(201)).expect(5).mount(&upstream).await;
    let router = test_router(Arc::clone(&store), &upstream).await;

    let add_key_body = r#"{"CanCreateChild":false,"Endpoints":{"photos":{"Path":"root/pictures","MaxPut":5,"PutTypes":["image/png"],"Put":true}},"InitiateExpire":"Put","ExpireDelta":60000}"#;
    let request = Request::builder()
        .method("POST")
        .uri("/addKey")
        .header("authorization", basic_auth(ADMIN_KEY))
        .header("content-type", "application/json")
        .body(Body::from(add_key_body))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["endpoints"]["photos"]["path"], "photos");
    let child_key = body["key_value"].as_str().expect("key_value present").to_string();
    assert_eq!(child_key.len(), 64);

    let stored = store.get(&child_key, 0).await.expect("child stored");
    let photos = &stored.endpoints["photos"];
    assert_eq!(photos.path, "/pictures");
    assert_eq!(photos.max_put, 5);
    assert!(photos.put);
    assert!(!photos.get);
    assert!(!stored.expire_started);

    // Scenario 3: five PUTs succeed, the record's counter and expiry clock
    // latch on the first, and a sixth is rejected before reaching upstream.
    for n in 1..=5 {
        let request = Request::builder()
            .method("PUT")
            .uri("/files/photos/x.png")
            .header("authorization", basic_auth(&child_key))
            .body(Body::from(PNG_BODY))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED, "put {n} should succeed");
    }

    let after_five = store.get(&child_key, 0).await.expect("still present");
    assert_eq!(after_five.endpoints["photos"].put_count, 5);
    assert!(after_five.expire_started);

    let sixth = Request::builder()
        .method("PUT")
        .uri("/files/photos/x.png")
        .header("authorization", basic_auth(&child_key))
        .body(Body::from(PNG_BODY))
        .unwrap();
    let response = router.clone().oneshot(sixth).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    upstream.verify().await;
}

/// Scenario 4: a Put whose detected MIME isn't in the endpoint's `PutTypes`
/// is rejected and never reaches upstream or increments `PutCount`.
#[tokio::test]
async fn scenario_4_mime_rejection_leaves_counter_untouched() {
    let store = Arc::new(MemoryKeyStore::new());
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "photos".to_string(),
        Endpoint {
            path: "/pictures".to_string(),
            copy: false,
            del: false,
            get: false,
            head: false,
            lock: false,
            mkcol: false,
            options: false,
            post: false,
            propfind: false,
            put: true,
            trace: false,
            unlock: false,
            get_count: 0,
            max_get: 0,
            put_count: 0,
            max_put: 5,
            mkcol_count: 0,
            max_mkcol: 0,
            max_put_size: 10_000_000,
            put_types: BTreeSet::from(["image/png".to_string()]),
        },
    );
    let key = KeyRecord {
        key_value: "mime-test-child".to_string(),
        can_create_child: false,
        endpoints,
        initiate_expire: InitiateExpire::Put,
        expire_delta: 60_000,
        expire_started: false,
        expire_start_time: 0,
    };
    store.insert(key).await.unwrap();

    let upstream = MockServer::start().await;
    // No mock mounted for PUT: any request reaching upstream fails the test.
    let router = test_router(Arc::clone(&store), &upstream).await;

    let request = Request::builder()
        .method("PUT")
        .uri("/files/photos/x.txt")
        .header("authorization", basic_auth("mime-test-child"))
        .body(Body::from("just plain text, not a png"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let record = store.get("mime-test-child", 0).await.unwrap();
    assert_eq!(record.endpoints["photos"].put_count, 0);
    assert!(!record.expire_started);
}

/// Scenario 5: a key whose clock started at creation is deleted the first
/// time it is accessed after its delta elapses.
#[tokio::test]
async fn scenario_5_lazy_expiry_deletes_on_access() {
    let store = Arc::new(MemoryKeyStore::new());
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "root".to_string(),
        Endpoint {
            path: "/".to_string(),
            copy: false,
            del: false,
            get: true,
            head: false,
            lock: false,
            mkcol: false,
            options: false,
            post: false,
            propfind: false,
            put: false,
            trace: false,
            unlock: false,
            get_count: 0,
            max_get: 100,
            put_count: 0,
            max_put: 0,
            mkcol_count: 0,
            max_mkcol: 0,
            max_put_size: 0,
            put_types: BTreeSet::new(),
        },
    );
    let created_at = i64::try_from(std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis()).unwrap();
    let key = KeyRecord {
        key_value: "soon-expired".to_string(),
        can_create_child: false,
        endpoints,
        initiate_expire: InitiateExpire::Creation,
        expire_delta: 1,
        expire_started: true,
        expire_start_time: created_at,
    };
    store.insert(key).await.unwrap();

    let upstream = MockServer::start().await;
    let router = test_router(Arc::clone(&store), &upstream).await;

    tokio::time::sleep(Duration::from_millis(5)).await;

    let request = Request::builder().method("GET").uri("/files/root/x.png").header("authorization", basic_auth("soon-expired")).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let now = i64::try_from(std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis()).unwrap();
    assert!(matches!(store.get("soon-expired", now).await, Err(proxy_core::CoreError::NotFound)));
}

/// Scenario 6: `/getChildKeys` enumerates every stored descendant, listing
/// each entry's path inside the caller's own namespace.
#[tokio::test]
async fn scenario_6_get_child_keys_enumerates_descendants() {
    let store = Arc::new(MemoryKeyStore::new());
    store.insert(admin_record()).await.expect("seed admin");
    let upstream = MockServer::start().await;
    let router = test_router(Arc::clone(&store), &upstream).await;

    let mint = |auth_key: String, body: &'static str| {
        let router = router.clone();
        async move {
            let request = Request::builder()
                .method("POST")
                .uri("/addKey")
                .header("authorization", basic_auth(&auth_key))
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
            json_body(response).await
        }
    };

    let b_body = r#"{"CanCreateChild":true,"Endpoints":{"b-root":{"Path":"root/a","Get":true,"MaxGet":50,"MaxPut":5,"MaxMkcol":10,"MaxPutSize":1000000}},"InitiateExpire":"Creation","ExpireDelta":100000}"#;
    let b = mint(ADMIN_KEY.to_string(), b_body).await;
    let b_key = b["key_value"].as_str().expect("b key_value").to_string();

    let c_body = r#"{"CanCreateChild":false,"Endpoints":{"c-root":{"Path":"b-root/b","Get":true,"MaxGet":10,"MaxPut":1,"MaxMkcol":1,"MaxPutSize":100000}},"InitiateExpire":"Creation","ExpireDelta":50000}"#;
    let c = mint(b_key.clone(), c_body).await;
    let c_key = c["key_value"].as_str().expect("c key_value").to_string();

    let request = Request::builder().method("GET").uri("/getChildKeys").header("authorization", basic_auth(ADMIN_KEY)).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let descendants = json_body(response).await;
    let list = descendants.as_array().expect("array response");
    assert_eq!(list.len(), 2);

    let find_entries = |key_value: &str| -> Vec<Value> {
        list.iter().find(|d| d["key_value"] == key_value).expect("descendant present")["entries"].as_array().expect("entries array").clone()
    };

    let b_entries = find_entries(&b_key);
    assert_eq!(b_entries[0]["path"], "root/a");

    let c_entries = find_entries(&c_key);
    assert_eq!(c_entries[0]["path"], "root/a/b");
}
