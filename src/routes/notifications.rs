use crate::auth::middleware::auth_middleware;
use crate::notification::controller::{
    get_settings, list_notifications, mark_all_read, mark_read, track_visit, unread_count,
    update_settings,
};
use crate::notification::service::NotificationService;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create a router for notification routes. Every route is scoped to the
/// authenticated recipient.
pub fn routes(notification_service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", put(mark_all_read))
        .route("/api/notifications/:id/read", put(mark_read))
        .route(
            "/api/notifications/settings",
            get(get_settings).put(update_settings),
        )
        .route("/api/notifications/track-visit", post(track_visit))
        .route_layer(middleware::from_fn(auth_middleware))
        .layer(axum::extract::Extension(notification_service))
}
