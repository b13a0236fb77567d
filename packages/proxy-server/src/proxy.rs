//! Proxy Engine (§4.5): forwards an authorized request to the upstream
//! origin over a shared, connection-pooled `reqwest::Client`, then runs a
//! method-specific response post-processor that commits the Key Store
//! counter increment on a `200`/`201` response.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use proxy_core::{CoreError, Method};
use reqwest::{Client, Url};

use crate::authorize::Authorized;
use crate::store::KeyStore;

/// `<D:href>` substitution target for the Propfind response rewrite.
const HREF_NEEDLE: &str = "<D:href>";

/// Request headers that must not be copied across a proxy hop.
const HOP_BY_HOP: &[&str] =
    &["connection", "keep-alive", "proxy-authenticate", "proxy-authorization", "te", "trailer", "transfer-encoding", "upgrade", "host"];

pub struct ProxyEngine {
    client: Client,
    upstream: Url,
}

struct Relayed {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ProxyEngine {
    #[must_use]
    pub fn new(client: Client, upstream: Url) -> Self {
        Self { client, upstream }
    }

    /// Forwards an authorized `/files/*` request and runs its post-processor
    /// (§4.5): Propfind body rewriting, and the Put/Get/Mkcol counter commit
    /// on `200`/`201`.
    pub async fn forward(&self, store: &dyn KeyStore, authorized: Authorized, incoming_headers: &HeaderMap, now_millis: i64) -> Response {
        let path = normalize_target_path(&authorized.target_path);
        let query = authorized.query.clone();
        let relayed = match self.relay(authorized.method.as_http_method(), &path, query.as_deref(), incoming_headers, authorized.body.clone()).await {
            Ok(relayed) => relayed,
            Err(resp) => return resp,
        };

        let Relayed { status, mut headers, body } = relayed;
        let body = if authorized.method == Method::Propfind {
            rewrite_propfind_body(body, &authorized.endpoint_name, &mut headers)
        } else {
            body
        };

        if is_committable(status) {
            commit_counter(store, &authorized, now_millis).await;
        } else if is_counter_gated(authorized.method) {
            // "bad put" (§4.5): logged, not surfaced as a new status — the
            // client already has the real upstream response in `status`.
            tracing::warn!(error = %CoreError::UpstreamError, status = %status, method = %authorized.method, "upstream rejected a counter-gated method");
        }

        build_response(status, headers, body)
    }

    /// Forwards an `/admin/*` request verbatim: no counter commit, no body
    /// rewrite.
    pub async fn forward_admin(&self, method: &str, path: &str, query: Option<&str>, incoming_headers: &HeaderMap, body: Bytes) -> Response {
        match self.relay(method, path, query, incoming_headers, body).await {
            Ok(relayed) => build_response(relayed.status, relayed.headers, relayed.body),
            Err(resp) => resp,
        }
    }

    async fn relay(&self, method: &str, path: &str, query: Option<&str>, incoming_headers: &HeaderMap, body: Bytes) -> Result<Relayed, Response> {
        let mut target = self.upstream.clone();
        target.set_path(path);
        target.set_query(query);

        let reqwest_method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;

        let mut outbound_headers = incoming_headers.clone();
        strip_hop_by_hop(&mut outbound_headers);
        if let Some(host) = incoming_headers.get(http::header::HOST).cloned() {
            outbound_headers.insert(HeaderName::from_static("x-forwarded-host"), host);
        }

        let upstream_response = self
            .client
            .request(reqwest_method, target)
            .headers(outbound_headers)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "upstream forward failed");
                StatusCode::BAD_GATEWAY.into_response()
            })?;

        let status = upstream_response.status();
        let headers = upstream_response.headers().clone();
        let body = upstream_response.bytes().await.map_err(|err| {
            tracing::warn!(error = %err, "reading upstream response body failed");
            StatusCode::BAD_GATEWAY.into_response()
        })?;

        Ok(Relayed { status, headers, body })
    }
}

fn is_committable(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

fn is_counter_gated(method: Method) -> bool {
    matches!(method, Method::Put | Method::Get | Method::Mkcol)
}

async fn commit_counter(store: &dyn KeyStore, authorized: &Authorized, now_millis: i64) {
    if !is_counter_gated(authorized.method) {
        return;
    }
    if let Err(err) = store.increment_counter(&authorized.key_value, &authorized.endpoint_name, authorized.method, now_millis).await {
        // Best-effort: the client already has its response. Log and move on
        // (§5 "Counter update is best-effort from the client's perspective").
        tracing::warn!(error = %err, method = %authorized.method, endpoint = %authorized.endpoint_name, "counter commit failed");
    }
}

fn normalize_target_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// §4.5: substitutes every `<D:href>` with `<D:href>/files/<endpoint>` and
/// recomputes `Content-Length`. Non-UTF-8 or needle-free bodies pass through
/// untouched.
fn rewrite_propfind_body(body: Bytes, endpoint_name: &str, headers: &mut HeaderMap) -> Bytes {
    let Ok(text) = std::str::from_utf8(&body) else {
        return body;
    };
    if !text.contains(HREF_NEEDLE) {
        return body;
    }
    let replacement = format!("<D:href>/files/{endpoint_name}");
    let rewritten = text.replace(HREF_NEEDLE, &replacement);
    if let Ok(value) = HeaderValue::from_str(&rewritten.len().to_string()) {
        headers.insert(http::header::CONTENT_LENGTH, value);
    }
    Bytes::from(rewritten)
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
