use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the service can take reflection traffic
    pub status: String,
    pub version: String,
    /// Whether the session store answered the ping
    pub database: bool,
}

/// Liveness for the reflection service: pings the session store. The
/// oracle is deliberately not probed — a health poll must not spend
/// completion quota or block on the LLM endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service can take reflection traffic", body = HealthResponse),
        (status = 503, description = "Session store unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let (http_status, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_body_reports_store_reachability() {
        let body = HealthResponse {
            status: "degraded".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["database"], false);
    }
}
