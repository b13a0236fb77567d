//! `/admin/*` handler (§4.6): Basic-authed against the process-configured
//! admin key, then forwarded verbatim to the separate admin upstream.

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use proxy_core::CoreError;

use crate::authorize::{buffer_body, parse_basic_auth};
use crate::error::ApiError;
use crate::handlers::AppState;

pub async fn admin_proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let headers = request.headers().clone();
    let key_value = match parse_basic_auth(&headers) {
        Ok(key) => key,
        Err(err) => return ApiError::from_core(err).into_response(),
    };
    if key_value != state.config.admin_key {
        return ApiError::from_core(CoreError::Unauthorized).into_response();
    }

    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    let body = match buffer_body(request.into_body()).await {
        Ok(body) => body,
        Err(err) => return ApiError::from_core(err).into_response(),
    };

    state.admin_proxy.forward_admin(&method, &path, query.as_deref(), &headers, body).await
}
