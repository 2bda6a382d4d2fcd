use crate::auth::middleware::auth_middleware;
use crate::comment::controller::{create_comment, list_comments};
use crate::comment::service::CommentService;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create a router for comment routes
pub fn routes(comment_service: Arc<CommentService>) -> Router {
    Router::new()
        // Listing an issue's comments is public
        .route("/api/issues/:id/comments", get(list_comments))
        // Creating comments requires authentication and triggers fan-out
        .route(
            "/api/issues/:id/comments",
            post(create_comment).route_layer(middleware::from_fn(auth_middleware)),
        )
        .layer(axum::extract::Extension(comment_service))
}
