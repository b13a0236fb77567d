//! `/files/*` handler: wires the Request Authorizer and the Proxy Engine
//! together for every WebDAV-ish method (§4.4, §4.5).

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use proxy_core::{CoreError, Method};

use crate::authorize::authorize_request;
use crate::error::ApiError;
use crate::handlers::{now_millis, AppState};

pub async fn files_handler(State(state): State<AppState>, request: Request) -> Response {
    let Some(method) = Method::from_http_method(request.method().as_str()) else {
        return ApiError::from_core(CoreError::Unauthorized).into_response();
    };

    let headers = request.headers().clone();
    let uri = request.uri().clone();
    let now = now_millis();

    match authorize_request(state.store.as_ref(), &headers, &uri, method, request.into_body(), now).await {
        Ok(authorized) => state.file_proxy.forward(state.store.as_ref(), authorized, &headers, now).await,
        Err(err) => ApiError::from_core(err).into_response(),
    }
}
