use crate::auth::middleware::AuthUser;
use crate::issue::model::{
    CreateIssueRequest, FeedQueryParams, IssueError, IssueErrorResponse, UpdateIssueRequest,
    VoteRequest,
};
use crate::issue::service::IssueService;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const ISSUE_TYPES: [&str; 3] = ["Idea", "Problem", "Question"];
const MEDIA_TYPES: [&str; 2] = ["image", "video"];
const GOVERNMENT_LEVELS: [&str; 3] = ["federal", "provincial", "municipal"];

// Helper function to convert IssueError to HTTP response
pub fn issue_error_to_response(err: IssueError) -> (StatusCode, Json<IssueErrorResponse>) {
    let (status, error_message, code) = match err {
        IssueError::DatabaseError(e) => {
            error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                "DB_ERROR",
            )
        }
        IssueError::Timeout(label) => {
            error!("Query timed out: {}", label);
            (
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out",
                "TIMEOUT",
            )
        }
        IssueError::CacheError(e) => {
            error!("Cache error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cache error",
                "CACHE_ERROR",
            )
        }
        IssueError::NotFound => (StatusCode::NOT_FOUND, "Issue not found", "NOT_FOUND"),
        IssueError::Unauthorized => (
            StatusCode::FORBIDDEN,
            "Not authorized to perform this action",
            "FORBIDDEN",
        ),
        IssueError::Restricted => (
            StatusCode::FORBIDDEN,
            "Account is restricted from posting",
            "RESTRICTED",
        ),
        IssueError::ValidationError(_) => {
            (StatusCode::BAD_REQUEST, "Invalid input", "VALIDATION_ERROR")
        }
    };

    let error_response = IssueErrorResponse {
        error: error_message.to_string(),
        code: code.to_string(),
    };

    (status, Json(error_response))
}

/// Get the aggregated issue feed
///
/// Returns the most recent issues with vote totals, vote breakdowns and
/// comment counts, optionally filtered and sorted.
#[utoipa::path(
    get,
    path = "/api/issues",
    tag = "issues",
    params(FeedQueryParams),
    responses(
        (status = 200, description = "Aggregated feed", body = FeedResponse),
        (status = 504, description = "A backing query timed out", body = IssueErrorResponse),
        (status = 500, description = "Internal server error", body = IssueErrorResponse)
    )
)]
pub async fn get_feed(
    Extension(issue_service): Extension<Arc<IssueService>>,
    Query(params): Query<FeedQueryParams>,
) -> impl IntoResponse {
    let (filters, sort) = params.into_parts();

    match issue_service.get_feed(filters, sort).await {
        Ok(feed) => (StatusCode::OK, Json(feed)).into_response(),
        Err(e) => issue_error_to_response(e).into_response(),
    }
}

/// Get a single issue by id
#[utoipa::path(
    get,
    path = "/api/issues/{id}",
    tag = "issues",
    params(
        ("id" = String, Path, description = "The ID of the issue")
    ),
    responses(
        (status = 200, description = "The issue", body = IssueRecord),
        (status = 404, description = "Issue not found", body = IssueErrorResponse),
        (status = 500, description = "Internal server error", body = IssueErrorResponse)
    )
)]
pub async fn get_issue(
    Path(issue_id): Path<Uuid>,
    Extension(issue_service): Extension<Arc<IssueService>>,
) -> impl IntoResponse {
    match issue_service.get_issue(issue_id).await {
        Ok(issue) => (StatusCode::OK, Json(issue)).into_response(),
        Err(e) => issue_error_to_response(e).into_response(),
    }
}

/// Create a new issue
///
/// Authenticated, non-restricted users only. District scoping fields are
/// passed through as resolved by the client.
#[utoipa::path(
    post,
    path = "/api/issues",
    tag = "issues",
    request_body = CreateIssueRequest,
    responses(
        (status = 201, description = "Issue created", body = IssueRecord),
        (status = 400, description = "Invalid input", body = IssueErrorResponse),
        (status = 401, description = "Unauthorized", body = IssueErrorResponse),
        (status = 403, description = "Account restricted", body = IssueErrorResponse),
        (status = 500, description = "Internal server error", body = IssueErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_issue(
    Extension(user): Extension<AuthUser>,
    Extension(issue_service): Extension<Arc<IssueService>>,
    Json(issue): Json<CreateIssueRequest>,
) -> impl IntoResponse {
    info!("Creating issue for user: {}", user.user_id);

    // Validate input
    if issue.title.trim().is_empty() {
        return issue_error_to_response(IssueError::ValidationError(
            "Title cannot be empty".to_string(),
        ))
        .into_response();
    }

    if issue.narrative.trim().is_empty() {
        return issue_error_to_response(IssueError::ValidationError(
            "Narrative cannot be empty".to_string(),
        ))
        .into_response();
    }

    if !ISSUE_TYPES.contains(&issue.issue_type.as_str()) {
        return issue_error_to_response(IssueError::ValidationError(
            "Issue type must be one of Idea, Problem, Question".to_string(),
        ))
        .into_response();
    }

    if issue.media_url.is_some() {
        match issue.media_type.as_deref() {
            Some(media_type) if MEDIA_TYPES.contains(&media_type) => {}
            _ => {
                return issue_error_to_response(IssueError::ValidationError(
                    "media_url requires media_type of image or video".to_string(),
                ))
                .into_response();
            }
        }
    }

    if let Some(level) = issue.government_level.as_deref() {
        if !GOVERNMENT_LEVELS.contains(&level) {
            return issue_error_to_response(IssueError::ValidationError(
                "Government level must be federal, provincial or municipal".to_string(),
            ))
            .into_response();
        }
    }

    match issue_service.create_issue(user.user_id, issue).await {
        Ok(created) => {
            info!("Successfully created issue with ID: {}", created.id);
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => issue_error_to_response(e).into_response(),
    }
}

/// Update an issue
///
/// Author only; title, narrative, type and topic are editable.
#[utoipa::path(
    put,
    path = "/api/issues/{id}",
    tag = "issues",
    params(
        ("id" = String, Path, description = "The ID of the issue to update")
    ),
    request_body = UpdateIssueRequest,
    responses(
        (status = 200, description = "Issue updated", body = IssueRecord),
        (status = 400, description = "Invalid input", body = IssueErrorResponse),
        (status = 403, description = "Not the author", body = IssueErrorResponse),
        (status = 404, description = "Issue not found", body = IssueErrorResponse),
        (status = 500, description = "Internal server error", body = IssueErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_issue(
    Path(issue_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(issue_service): Extension<Arc<IssueService>>,
    Json(update): Json<UpdateIssueRequest>,
) -> impl IntoResponse {
    info!("Updating issue: {}, user: {}", issue_id, user.user_id);

    if let Some(title) = &update.title {
        if title.trim().is_empty() {
            return issue_error_to_response(IssueError::ValidationError(
                "Title cannot be empty".to_string(),
            ))
            .into_response();
        }
    }

    if let Some(narrative) = &update.narrative {
        if narrative.trim().is_empty() {
            return issue_error_to_response(IssueError::ValidationError(
                "Narrative cannot be empty".to_string(),
            ))
            .into_response();
        }
    }

    if let Some(issue_type) = &update.issue_type {
        if !ISSUE_TYPES.contains(&issue_type.as_str()) {
            return issue_error_to_response(IssueError::ValidationError(
                "Issue type must be one of Idea, Problem, Question".to_string(),
            ))
            .into_response();
        }
    }

    match issue_service
        .update_issue(issue_id, user.user_id, update)
        .await
    {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => issue_error_to_response(e).into_response(),
    }
}

/// Vote on an issue
///
/// Value must be +1 or -1. A changed value overwrites the previous vote;
/// an identical value is idempotent. Returns the refreshed totals.
#[utoipa::path(
    post,
    path = "/api/issues/{id}/vote",
    tag = "issues",
    params(
        ("id" = String, Path, description = "The ID of the issue to vote on")
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Refreshed vote totals", body = VoteSummary),
        (status = 400, description = "Invalid vote value", body = IssueErrorResponse),
        (status = 401, description = "Unauthorized", body = IssueErrorResponse),
        (status = 404, description = "Issue not found", body = IssueErrorResponse),
        (status = 500, description = "Internal server error", body = IssueErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn vote(
    Path(issue_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(issue_service): Extension<Arc<IssueService>>,
    Json(vote): Json<VoteRequest>,
) -> impl IntoResponse {
    if vote.value != 1 && vote.value != -1 {
        return issue_error_to_response(IssueError::ValidationError(
            "Vote value must be +1 or -1".to_string(),
        ))
        .into_response();
    }

    match issue_service
        .vote(issue_id, user.user_id, vote.value)
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => issue_error_to_response(e).into_response(),
    }
}
