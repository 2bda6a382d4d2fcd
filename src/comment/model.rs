use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbError;
use crate::schema_ext::{DateTimeWrapper, UuidWrapper};

/// A comment joined with its author's display fields.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct CommentRecord {
    #[schema(value_type = UuidWrapper)]
    pub id: Uuid,

    #[schema(value_type = UuidWrapper)]
    pub issue_id: Uuid,

    /// Present on replies; a top-level comment has no parent
    #[schema(value_type = Option<UuidWrapper>)]
    pub parent_id: Option<Uuid>,

    #[schema(value_type = UuidWrapper)]
    pub author_id: Uuid,

    pub content: String,

    #[schema(value_type = DateTimeWrapper)]
    pub created_at: DateTime<Utc>,

    pub author_username: Option<String>,
    pub author_role: Option<String>,
    pub author_avatar_url: Option<String>,
}

/// Request to create a new comment
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateCommentRequest {
    /// The comment body
    #[schema(example = "The same pothole swallowed my bike last week.")]
    pub content: String,

    /// ID of the parent comment if this is a reply
    #[schema(value_type = Option<UuidWrapper>)]
    pub parent_id: Option<Uuid>,
}

/// Response for a comment listing. The list is flat and ordered oldest
/// first; clients assemble the thread from parent_id.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentListResponse {
    pub comments: Vec<CommentRecord>,

    #[schema(example = "17")]
    pub total_count: i64,
}

/// Possible comment errors
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Issue not found")]
    IssueNotFound,

    #[error("Parent comment not found")]
    ParentNotFound,

    #[error("Not authorized to perform this action")]
    Unauthorized,

    #[error("Account is restricted from commenting")]
    Restricted,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<DbError> for CommentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout(label) => Self::Timeout(label),
            DbError::Backend(e) => Self::DatabaseError(e),
        }
    }
}

/// Error response for the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentErrorResponse {
    /// Error message
    #[schema(example = "Parent comment not found")]
    pub error: String,

    /// Error code
    #[schema(example = "PARENT_NOT_FOUND")]
    pub code: String,
}
