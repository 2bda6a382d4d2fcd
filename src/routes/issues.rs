use crate::auth::middleware::auth_middleware;
use crate::issue::controller::{create_issue, get_feed, get_issue, update_issue, vote};
use crate::issue::service::IssueService;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create a router for issue routes
pub fn routes(issue_service: Arc<IssueService>) -> Router {
    Router::new()
        // Public reads: the aggregated feed and single issues
        .route("/api/issues", get(get_feed))
        .route("/api/issues/:id", get(get_issue))
        // Mutations require authentication
        .route(
            "/api/issues",
            post(create_issue).route_layer(middleware::from_fn(auth_middleware)),
        )
        .route(
            "/api/issues/:id",
            put(update_issue).route_layer(middleware::from_fn(auth_middleware)),
        )
        .route(
            "/api/issues/:id/vote",
            post(vote).route_layer(middleware::from_fn(auth_middleware)),
        )
        .layer(axum::extract::Extension(issue_service))
}
