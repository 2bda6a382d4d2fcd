use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
#[allow(unused_imports)]
use utoipa::{OpenApi, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    database: String,
}

/// Health check endpoint
///
/// Returns status "ok" if the service is running, along with the result of
/// a database ping.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy"),
    ),
    tag = "health"
)]
pub async fn health_check(State(pool): State<PgPool>) -> impl IntoResponse {
    let db_status = match sqlx::query("SELECT 1").fetch_one(&pool).await {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            database: db_status.to_string(),
        }),
    )
}

pub fn routes(pool: PgPool) -> Router {
    Router::new().route("/health", get(health_check).with_state(pool))
}
