use crate::auth::middleware::AuthUser;
use crate::profile::model::{BookmarkResponse, ProfileError, ProfileErrorResponse, ProfileResponse};
use crate::profile::service::ProfileService;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

// Helper function to convert ProfileError to HTTP response
fn profile_error_to_response(err: ProfileError) -> (StatusCode, Json<ProfileErrorResponse>) {
    let (status, error_message, code) = match err {
        ProfileError::DatabaseError(e) => {
            error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                "DB_ERROR",
            )
        }
        ProfileError::Timeout(label) => {
            error!("Query timed out: {}", label);
            (
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out",
                "TIMEOUT",
            )
        }
        ProfileError::NotFound => (StatusCode::NOT_FOUND, "Profile not found", "NOT_FOUND"),
        ProfileError::Unauthorized => (
            StatusCode::FORBIDDEN,
            "Not authorized to perform this action",
            "FORBIDDEN",
        ),
    };

    let error_response = ProfileErrorResponse {
        error: error_message.to_string(),
        code: code.to_string(),
    };

    (status, Json(error_response))
}

/// Get a profile
///
/// Public display fields for any profile. The bookmark list is included
/// only when the caller requests their own profile.
#[utoipa::path(
    get,
    path = "/api/profiles/{id}",
    tag = "profiles",
    params(
        ("id" = String, Path, description = "The ID of the profile")
    ),
    responses(
        (status = 200, description = "Profile retrieved", body = ProfileResponse),
        (status = 404, description = "Profile not found", body = ProfileErrorResponse),
        (status = 500, description = "Internal server error", body = ProfileErrorResponse)
    )
)]
pub async fn get_profile(
    Path(profile_id): Path<Uuid>,
    Extension(viewer): Extension<Option<AuthUser>>,
    Extension(profile_service): Extension<Arc<ProfileService>>,
) -> Result<(StatusCode, Json<ProfileResponse>), (StatusCode, Json<ProfileErrorResponse>)> {
    let viewer_id = viewer.map(|user| user.user_id);

    match profile_service.get_profile(profile_id, viewer_id).await {
        Ok(profile) => Ok((StatusCode::OK, Json(profile))),
        Err(err) => Err(profile_error_to_response(err)),
    }
}

/// Bookmark an issue
///
/// Adds the issue to the caller's bookmark list; bookmarking it twice is
/// harmless. The bookmark digest job watches bookmarked issues for new
/// comments.
#[utoipa::path(
    post,
    path = "/api/profiles/bookmarks/{issue_id}",
    tag = "profiles",
    params(
        ("issue_id" = String, Path, description = "The ID of the issue to bookmark")
    ),
    responses(
        (status = 200, description = "Bookmark added", body = BookmarkResponse),
        (status = 401, description = "Unauthorized", body = ProfileErrorResponse),
        (status = 500, description = "Internal server error", body = ProfileErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_bookmark(
    Path(issue_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(profile_service): Extension<Arc<ProfileService>>,
) -> impl IntoResponse {
    match profile_service.add_bookmark(user.user_id, issue_id).await {
        Ok(bookmarks) => (
            StatusCode::OK,
            Json(BookmarkResponse {
                success: true,
                bookmarks,
            }),
        )
            .into_response(),
        Err(e) => profile_error_to_response(e).into_response(),
    }
}

/// Remove a bookmark
///
/// Removes the issue from the caller's bookmark list; removing one that
/// was never bookmarked is a no-op.
#[utoipa::path(
    delete,
    path = "/api/profiles/bookmarks/{issue_id}",
    tag = "profiles",
    params(
        ("issue_id" = String, Path, description = "The ID of the issue to remove")
    ),
    responses(
        (status = 200, description = "Bookmark removed", body = BookmarkResponse),
        (status = 401, description = "Unauthorized", body = ProfileErrorResponse),
        (status = 500, description = "Internal server error", body = ProfileErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_bookmark(
    Path(issue_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(profile_service): Extension<Arc<ProfileService>>,
) -> impl IntoResponse {
    match profile_service.remove_bookmark(user.user_id, issue_id).await {
        Ok(bookmarks) => (
            StatusCode::OK,
            Json(BookmarkResponse {
                success: true,
                bookmarks,
            }),
        )
            .into_response(),
        Err(e) => profile_error_to_response(e).into_response(),
    }
}
