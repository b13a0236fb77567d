//! `GET /healthz` — ambient liveness probe, not named by the spec but not
//! excluded by any Non-goal either (`SPEC_FULL.md` §4.6).

use axum::http::StatusCode;

/// Always `200 OK` once the process is accepting connections — the server
/// only starts serving after the admin key has been seeded, so reachability
/// here implies that already happened.
pub async fn healthz_handler() -> StatusCode {
    StatusCode::OK
}
