use crate::auth::middleware::{auth_middleware, optional_auth_middleware};
use crate::profile::controller::{add_bookmark, get_profile, remove_bookmark};
use crate::profile::service::ProfileService;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Create a router for profile routes
pub fn routes(profile_service: Arc<ProfileService>) -> Router {
    Router::new()
        // Public profile view; bookmarks appear only for the owner, so the
        // auth is optional rather than required
        .route(
            "/api/profiles/:id",
            get(get_profile).route_layer(middleware::from_fn(optional_auth_middleware)),
        )
        // Bookmark mutations always belong to the caller
        .route(
            "/api/profiles/bookmarks/:issue_id",
            post(add_bookmark).route_layer(middleware::from_fn(auth_middleware)),
        )
        .route(
            "/api/profiles/bookmarks/:issue_id",
            delete(remove_bookmark).route_layer(middleware::from_fn(auth_middleware)),
        )
        .layer(axum::extract::Extension(profile_service))
}
