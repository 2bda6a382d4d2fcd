use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbError;
use crate::schema_ext::{DateTimeWrapper, UuidWrapper};

/// Notification categories persisted in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CommentOnPost,
    ReplyToComment,
    BookmarkSummary,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::CommentOnPost => "comment_on_post",
            NotificationType::ReplyToComment => "reply_to_comment",
            NotificationType::BookmarkSummary => "bookmark_summary",
        }
    }
}

/// One row of a user's notification list, flattened with the joined issue
/// title and actor display fields. Actor fields are absent for digest rows
/// (no single actor) and for deleted profiles.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct NotificationRecord {
    #[schema(value_type = UuidWrapper)]
    pub id: Uuid,

    /// One of comment_on_post, reply_to_comment, bookmark_summary
    #[serde(rename = "type")]
    #[schema(example = "comment_on_post")]
    pub notification_type: String,

    #[schema(value_type = Option<UuidWrapper>)]
    pub issue_id: Option<Uuid>,

    #[schema(value_type = Option<UuidWrapper>)]
    pub comment_id: Option<Uuid>,

    #[schema(value_type = Option<UuidWrapper>)]
    pub actor_id: Option<Uuid>,

    /// First 100 characters of the triggering comment, or the issue title
    /// for a bookmark digest
    pub content_preview: Option<String>,

    /// New-comment count carried by bookmark digests; 1 otherwise
    #[schema(example = "3")]
    pub aggregate_count: i32,

    pub is_read: bool,

    #[schema(value_type = DateTimeWrapper)]
    pub created_at: DateTime<Utc>,

    pub issue_title: Option<String>,
    pub actor_username: Option<String>,
    pub actor_avatar_url: Option<String>,
}

/// Response for the notification list endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationRecord>,

    /// Unread notifications across the whole account, not just this page
    #[schema(example = "4")]
    pub unread_count: i64,

    /// True when another page exists beyond this one
    pub has_more: bool,
}

/// Response for the unread count endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    #[schema(example = "4")]
    pub count: i64,
}

/// A user's per-type notification toggles. A user without a settings row
/// gets the defaults: everything enabled.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct NotificationSettings {
    #[schema(example = "true")]
    pub comment_on_post_enabled: bool,
    #[schema(example = "true")]
    pub reply_to_comment_enabled: bool,
    #[schema(example = "true")]
    pub bookmark_summary_enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            comment_on_post_enabled: true,
            reply_to_comment_enabled: true,
            bookmark_summary_enabled: true,
        }
    }
}

impl NotificationSettings {
    pub fn allows(&self, notification_type: NotificationType) -> bool {
        match notification_type {
            NotificationType::CommentOnPost => self.comment_on_post_enabled,
            NotificationType::ReplyToComment => self.reply_to_comment_enabled,
            NotificationType::BookmarkSummary => self.bookmark_summary_enabled,
        }
    }
}

/// Partial update of the notification toggles; omitted fields keep their
/// current value
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateSettingsRequest {
    pub comment_on_post_enabled: Option<bool>,
    pub reply_to_comment_enabled: Option<bool>,
    pub bookmark_summary_enabled: Option<bool>,
}

/// Request body for recording an issue visit
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TrackVisitRequest {
    #[schema(value_type = UuidWrapper)]
    pub issue_id: Uuid,
}

/// Generic acknowledgement for state-changing notification endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Summary returned by the bookmark digest job
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DigestSummary {
    pub success: bool,

    /// Users with at least one bookmark that the run examined
    #[schema(example = "12")]
    pub processed: i64,

    /// Digest rows inserted (same-day re-runs update in place and do not
    /// count here)
    #[schema(example = "3")]
    pub notifications_created: i64,
}

/// Summary returned by the retention job
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupSummary {
    pub success: bool,

    /// Read notifications older than 30 days removed
    #[schema(example = "87")]
    pub deleted_read_30d: i64,

    /// Notifications older than 60 days removed regardless of read state
    #[schema(example = "5")]
    pub deleted_all_60d: i64,
}

/// Possible notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Cache error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("Notification not found")]
    NotFound,

    #[error("Not authorized to perform this action")]
    Unauthorized,
}

impl From<DbError> for NotificationError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout(label) => Self::Timeout(label),
            DbError::Backend(e) => Self::DatabaseError(e),
        }
    }
}

/// Error response for the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationErrorResponse {
    /// Error message
    #[schema(example = "Notification not found")]
    pub error: String,

    /// Error code
    #[schema(example = "NOT_FOUND")]
    pub code: String,
}
