use crate::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    users: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sessions: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct HealthQuery {
    mode: Option<String>,
}

fn backend_status<E: std::fmt::Display>(backend: &str, result: Result<(), E>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!("Health check: {} storage unreachable: {}", backend, e);
            "error"
        }
    }
}

/// Responds with the health status of the server.
///
/// - By default (no query parameters), performs a light check to confirm the web server
///   is running.
///
/// - If `mode=full` is passed as a query parameter, also pings the user and session
///   storage backends.
///
/// # Query Parameters
/// - `mode`: Optional. Accepts `"light"` (default) or `"full"`.
///
/// # Responses
/// - `200 OK` with `{ "status": "ok" }` if the server (and both backends, in full mode) are healthy.
/// - `500 INTERNAL SERVER ERROR` with `{ "status": "error", ... }` naming the failing backend.
///
/// # Examples
/// - `GET /health` → 200 OK
/// - `GET /health?mode=full` → 200 OK or 500 INTERNAL SERVER ERROR
pub async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    match params.mode.as_deref() {
        Some("full") => {
            let (users, sessions) = tokio::join!(state.users().ping(), state.sessions().ping());
            let users = backend_status("user", users);
            let sessions = backend_status("session", sessions);

            let healthy = users == "ok" && sessions == "ok";
            let status = if healthy {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };

            (
                status,
                Json(HealthResponse {
                    status: if healthy { "ok" } else { "error" },
                    users: Some(users),
                    sessions: Some(sessions),
                }),
            )
        }
        _ => {
            // Light health check
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "ok",
                    users: None,
                    sessions: None,
                }),
            )
        }
    }
}
