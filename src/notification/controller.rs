use crate::auth::middleware::AuthUser;
use crate::notification::digest::DigestService;
use crate::notification::model::{
    CleanupSummary, DigestSummary, NotificationError, NotificationErrorResponse,
    NotificationListResponse, NotificationSettings, SuccessResponse, TrackVisitRequest,
    UnreadCountResponse, UpdateSettingsRequest,
};
use crate::notification::service::NotificationService;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// Query parameters for the notification list
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct NotificationQueryParams {
    #[schema(example = "20")]
    limit: Option<i64>,
    #[schema(example = "0")]
    offset: Option<i64>,
    #[schema(example = "false")]
    unread_only: Option<bool>,
}

// Helper function to convert NotificationError to HTTP response
fn notification_error_to_response(
    err: NotificationError,
) -> (StatusCode, Json<NotificationErrorResponse>) {
    let (status, error_message, code) = match err {
        NotificationError::DatabaseError(e) => {
            error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                "DB_ERROR",
            )
        }
        NotificationError::Timeout(label) => {
            error!("Query timed out: {}", label);
            (
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out",
                "TIMEOUT",
            )
        }
        NotificationError::CacheError(e) => {
            error!("Cache error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cache error",
                "CACHE_ERROR",
            )
        }
        NotificationError::NotFound => (
            StatusCode::NOT_FOUND,
            "Notification not found",
            "NOT_FOUND",
        ),
        NotificationError::Unauthorized => (
            StatusCode::FORBIDDEN,
            "Not authorized to perform this action",
            "FORBIDDEN",
        ),
    };

    let error_response = NotificationErrorResponse {
        error: error_message.to_string(),
        code: code.to_string(),
    };

    (status, Json(error_response))
}

/// List the caller's notifications
///
/// Returns notifications newest first with joined issue titles and actor
/// display fields, plus the account-wide unread count.
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    params(NotificationQueryParams),
    responses(
        (status = 200, description = "Notifications retrieved successfully", body = NotificationListResponse),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_notifications(
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
    Query(params): Query<NotificationQueryParams>,
) -> Result<
    (StatusCode, Json<NotificationListResponse>),
    (StatusCode, Json<NotificationErrorResponse>),
> {
    match notification_service
        .list_notifications(
            user.user_id,
            params.limit,
            params.offset,
            params.unread_only.unwrap_or(false),
        )
        .await
    {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(err) => {
            error!("Error listing notifications: {:?}", err);
            Err(notification_error_to_response(err))
        }
    }
}

/// Get the caller's unread notification count
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "notifications",
    responses(
        (status = 200, description = "Unread count retrieved", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unread_count(
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<UnreadCountResponse>), (StatusCode, Json<NotificationErrorResponse>)>
{
    match notification_service.unread_count(user.user_id).await {
        Ok(count) => Ok((StatusCode::OK, Json(UnreadCountResponse { count }))),
        Err(err) => Err(notification_error_to_response(err)),
    }
}

/// Mark one notification read
///
/// Only the recipient can mark their notification; anyone else gets a 403.
#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "The ID of the notification to mark read")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = SuccessResponse),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 403, description = "Not the recipient", body = NotificationErrorResponse),
        (status = 404, description = "Notification not found", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_read(
    Path(notification_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> impl IntoResponse {
    match notification_service
        .mark_read(notification_id, user.user_id)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => notification_error_to_response(e).into_response(),
    }
}

/// Mark all of the caller's notifications read
#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "All notifications marked read", body = SuccessResponse),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_all_read(
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> impl IntoResponse {
    match notification_service.mark_all_read(user.user_id).await {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => notification_error_to_response(e).into_response(),
    }
}

/// Get the caller's notification settings
///
/// A user who never touched their settings gets the defaults: every
/// notification type enabled.
#[utoipa::path(
    get,
    path = "/api/notifications/settings",
    tag = "notifications",
    responses(
        (status = 200, description = "Settings retrieved", body = NotificationSettings),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_settings(
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<NotificationSettings>), (StatusCode, Json<NotificationErrorResponse>)>
{
    match notification_service.get_settings(user.user_id).await {
        Ok(settings) => Ok((StatusCode::OK, Json(settings))),
        Err(err) => Err(notification_error_to_response(err)),
    }
}

/// Update the caller's notification settings
///
/// Only the provided toggles change; the rest keep their current value.
#[utoipa::path(
    put,
    path = "/api/notifications/settings",
    tag = "notifications",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = NotificationSettings),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_settings(
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
    Json(update): Json<UpdateSettingsRequest>,
) -> impl IntoResponse {
    match notification_service
        .update_settings(user.user_id, update)
        .await
    {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(e) => notification_error_to_response(e).into_response(),
    }
}

/// Record a visit to an issue
///
/// Stores the moment the caller last viewed the issue; the bookmark digest
/// only counts comments newer than it.
#[utoipa::path(
    post,
    path = "/api/notifications/track-visit",
    tag = "notifications",
    request_body = TrackVisitRequest,
    responses(
        (status = 200, description = "Visit recorded", body = SuccessResponse),
        (status = 401, description = "Unauthorized", body = NotificationErrorResponse),
        (status = 500, description = "Internal server error", body = NotificationErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn track_visit(
    Extension(user): Extension<AuthUser>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
    Json(request): Json<TrackVisitRequest>,
) -> impl IntoResponse {
    match notification_service
        .track_visit(user.user_id, request.issue_id)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => notification_error_to_response(e).into_response(),
    }
}

/// Run the bookmark digest job
///
/// Scheduled trigger: rolls up unseen comment activity on bookmarked
/// issues into daily digest notifications. Relies on platform-level
/// trust, not bearer auth.
#[utoipa::path(
    post,
    path = "/api/jobs/bookmark-digest",
    tag = "jobs",
    responses(
        (status = 200, description = "Digest run completed", body = DigestSummary),
        (status = 500, description = "Digest run failed", body = DigestSummary)
    )
)]
pub async fn run_bookmark_digest(
    Extension(digest_service): Extension<Arc<DigestService>>,
) -> impl IntoResponse {
    info!("Bookmark digest triggered");
    let summary = digest_service.run_bookmark_digest().await;
    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary))
}

/// Run the notification retention job
///
/// Scheduled trigger: removes read notifications older than 30 days and
/// any notification older than 60 days.
#[utoipa::path(
    post,
    path = "/api/jobs/notification-cleanup",
    tag = "jobs",
    responses(
        (status = 200, description = "Cleanup completed", body = CleanupSummary),
        (status = 500, description = "Cleanup failed", body = CleanupSummary)
    )
)]
pub async fn cleanup_notifications(
    Extension(digest_service): Extension<Arc<DigestService>>,
) -> impl IntoResponse {
    info!("Notification cleanup triggered");
    let summary = digest_service.cleanup_notifications().await;
    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary))
}
