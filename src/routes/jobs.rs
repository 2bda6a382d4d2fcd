use crate::notification::controller::{cleanup_notifications, run_bookmark_digest};
use crate::notification::digest::DigestService;
use axum::{routing::post, Router};
use std::sync::Arc;

/// Create a router for the scheduled job triggers. No bearer auth: the
/// deployment platform invokes these on a schedule and is trusted at the
/// network layer.
pub fn routes(digest_service: Arc<DigestService>) -> Router {
    Router::new()
        .route("/api/jobs/bookmark-digest", post(run_bookmark_digest))
        .route("/api/jobs/notification-cleanup", post(cleanup_notifications))
        .layer(axum::extract::Extension(digest_service))
}
