use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbError;
use crate::schema_ext::{DateTimeWrapper, UuidWrapper};

/// A profile row as stored.
#[derive(Debug, FromRow, Clone)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub bookmarks: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a profile. Bookmarks are only present when the caller
/// is looking at their own profile.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = UuidWrapper)]
    pub id: Uuid,

    #[schema(example = "marie_tremblay")]
    pub username: String,

    pub avatar_url: Option<String>,

    /// Display role snapshot, e.g. Resident, Politician, Candidate
    #[schema(example = "Resident")]
    pub role: String,

    #[schema(value_type = DateTimeWrapper)]
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<UuidWrapper>>)]
    pub bookmarks: Option<Vec<Uuid>>,
}

/// Response for bookmark add/remove with the refreshed list
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookmarkResponse {
    pub success: bool,

    #[schema(value_type = Vec<UuidWrapper>)]
    pub bookmarks: Vec<Uuid>,
}

/// Possible profile errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Profile not found")]
    NotFound,

    #[error("Not authorized to perform this action")]
    Unauthorized,
}

impl From<DbError> for ProfileError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout(label) => Self::Timeout(label),
            DbError::Backend(e) => Self::DatabaseError(e),
        }
    }
}

/// Error response for the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileErrorResponse {
    /// Error message
    #[schema(example = "Profile not found")]
    pub error: String,

    /// Error code
    #[schema(example = "NOT_FOUND")]
    pub code: String,
}
