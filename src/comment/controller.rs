use crate::auth::middleware::AuthUser;
use crate::comment::model::{
    CommentError, CommentErrorResponse, CommentListResponse, CreateCommentRequest,
};
use crate::comment::service::CommentService;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const MAX_COMMENT_LENGTH: usize = 5000;

// Helper function to convert CommentError to HTTP response
fn comment_error_to_response(err: CommentError) -> (StatusCode, Json<CommentErrorResponse>) {
    let (status, error_message, code) = match err {
        CommentError::DatabaseError(e) => {
            error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                "DB_ERROR",
            )
        }
        CommentError::Timeout(label) => {
            error!("Query timed out: {}", label);
            (
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out",
                "TIMEOUT",
            )
        }
        CommentError::IssueNotFound => (StatusCode::NOT_FOUND, "Issue not found", "NOT_FOUND"),
        CommentError::ParentNotFound => (
            StatusCode::NOT_FOUND,
            "Parent comment not found",
            "PARENT_NOT_FOUND",
        ),
        CommentError::Unauthorized => (
            StatusCode::FORBIDDEN,
            "Not authorized to perform this action",
            "FORBIDDEN",
        ),
        CommentError::Restricted => (
            StatusCode::FORBIDDEN,
            "Account is restricted from commenting",
            "RESTRICTED",
        ),
        CommentError::ValidationError(_) => {
            (StatusCode::BAD_REQUEST, "Invalid input", "VALIDATION_ERROR")
        }
    };

    let error_response = CommentErrorResponse {
        error: error_message.to_string(),
        code: code.to_string(),
    };

    (status, Json(error_response))
}

/// Create a comment on an issue
///
/// Adds a top-level comment or a reply and fans out the resulting
/// notifications to the issue author or parent comment author.
#[utoipa::path(
    post,
    path = "/api/issues/{id}/comments",
    tag = "comments",
    params(
        ("id" = String, Path, description = "The ID of the issue to comment on")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created successfully", body = CommentRecord),
        (status = 400, description = "Invalid input", body = CommentErrorResponse),
        (status = 401, description = "Unauthorized", body = CommentErrorResponse),
        (status = 403, description = "Restricted account", body = CommentErrorResponse),
        (status = 404, description = "Issue or parent comment not found", body = CommentErrorResponse),
        (status = 500, description = "Internal server error", body = CommentErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_comment(
    Path(issue_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(comment_service): Extension<Arc<CommentService>>,
    Json(comment): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    info!(
        "Creating comment on issue: {}, user: {}",
        issue_id, user.user_id
    );

    // Validate input
    if comment.content.trim().is_empty() {
        return comment_error_to_response(CommentError::ValidationError(
            "Comment content cannot be empty".to_string(),
        ))
        .into_response();
    }

    if comment.content.len() > MAX_COMMENT_LENGTH {
        return comment_error_to_response(CommentError::ValidationError(
            "Comment content exceeds maximum length".to_string(),
        ))
        .into_response();
    }

    match comment_service
        .create_comment(issue_id, user.user_id, comment)
        .await
    {
        Ok(comment) => {
            info!("Successfully created comment with ID: {}", comment.id);
            (StatusCode::CREATED, Json(comment)).into_response()
        }
        Err(e) => comment_error_to_response(e).into_response(),
    }
}

/// List the comments on an issue
///
/// Returns every comment on the issue oldest first, joined with author
/// display fields. The client assembles the reply tree from parent_id.
#[utoipa::path(
    get,
    path = "/api/issues/{id}/comments",
    tag = "comments",
    params(
        ("id" = String, Path, description = "The ID of the issue to list comments for")
    ),
    responses(
        (status = 200, description = "Comments retrieved successfully", body = CommentListResponse),
        (status = 500, description = "Internal server error", body = CommentErrorResponse)
    )
)]
pub async fn list_comments(
    Path(issue_id): Path<Uuid>,
    Extension(comment_service): Extension<Arc<CommentService>>,
) -> Result<(StatusCode, Json<CommentListResponse>), (StatusCode, Json<CommentErrorResponse>)> {
    match comment_service.list_comments(issue_id).await {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(err) => {
            error!("Error listing comments: {:?}", err);
            Err(comment_error_to_response(err))
        }
    }
}
