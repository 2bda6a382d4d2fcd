use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use thiserror;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::DbError;
use crate::district::model::DistrictLevel;
use crate::schema_ext::{DateTimeWrapper, UuidWrapper};

/// An issue row joined with its author's display snapshot. Joined shapes
/// are flattened here at the data-access boundary; aggregation never sees
/// nested profile rows.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct IssueRecord {
    #[schema(value_type = UuidWrapper)]
    pub id: Uuid,
    pub title: String,
    /// One of Idea, Problem, Question
    #[schema(example = "Problem")]
    pub issue_type: String,
    pub narrative: String,
    pub media_url: Option<String>,
    /// "image" or "video"; the media payload carries exactly one kind
    pub media_type: Option<String>,
    #[schema(value_type = UuidWrapper)]
    pub author_id: Uuid,
    pub topic: Option<String>,
    #[schema(example = "municipal")]
    pub government_level: Option<String>,
    pub federal_district: Option<String>,
    pub provincial_district: Option<String>,
    pub municipal_district: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub address: Option<String>,
    #[schema(value_type = DateTimeWrapper)]
    pub created_at: DateTime<Utc>,

    pub author_username: Option<String>,
    pub author_role: Option<String>,
    pub author_avatar_url: Option<String>,
    pub author_city: Option<String>,
    pub author_province: Option<String>,
}

impl IssueRecord {
    /// The district field scoping this issue to the given level.
    pub fn district_for(&self, level: DistrictLevel) -> Option<&str> {
        match level {
            DistrictLevel::Federal => self.federal_district.as_deref(),
            DistrictLevel::Provincial => self.provincial_district.as_deref(),
            DistrictLevel::Municipal => self.municipal_district.as_deref(),
        }
    }
}

/// A raw vote row as read from the store.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct VoteRow {
    pub issue_id: Uuid,
    pub value: i16,
}

/// Upvote/downvote counts for one issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Net vote score per issue id.
pub type VoteMap = HashMap<Uuid, i64>;
/// Upvote/downvote breakdown per issue id.
pub type VoteBreakdown = HashMap<Uuid, VoteCounts>;
/// Comment count per issue id; zero-comment issues are present with 0.
pub type CommentsCountMap = HashMap<Uuid, i64>;

/// Sort modes for the issue feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    #[default]
    New,
    Popular,
    Controversial,
}

/// Feed filters; all active filters must match (the search term, when
/// present, decides by itself).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FeedFilters {
    /// Exact match on the issue type
    pub issue_type: Option<String>,
    pub government_level: Option<DistrictLevel>,
    /// Exact match on the selected level's district field; only applied
    /// when government_level is also set
    pub district: Option<String>,
    /// Exact match on the author's role snapshot
    pub author_role: Option<String>,
    /// Case-insensitive substring over address, narrative, title, and
    /// author username
    pub search: Option<String>,
}

impl FeedFilters {
    /// True when no filter is active at all.
    pub fn is_empty(&self) -> bool {
        self.issue_type.is_none()
            && self.government_level.is_none()
            && self.district.is_none()
            && self.author_role.is_none()
            && self.search.is_none()
    }
}

/// Wire shape of the feed query string: the filters plus the sort mode.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct FeedQueryParams {
    pub issue_type: Option<String>,
    pub government_level: Option<DistrictLevel>,
    pub district: Option<String>,
    pub author_role: Option<String>,
    pub search: Option<String>,
    pub sort: Option<FeedSort>,
}

impl FeedQueryParams {
    pub fn into_parts(self) -> (FeedFilters, FeedSort) {
        (
            FeedFilters {
                issue_type: self.issue_type,
                government_level: self.government_level,
                district: self.district,
                author_role: self.author_role,
                search: self.search,
            },
            self.sort.unwrap_or_default(),
        )
    }
}

/// The aggregated feed: filtered issues plus count maps over every issue
/// that was fetched (not only those that survived the filters).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedResponse {
    pub issues: Vec<IssueRecord>,
    #[schema(value_type = Object)]
    pub votes: VoteMap,
    #[schema(value_type = Object)]
    pub vote_breakdown: VoteBreakdown,
    #[schema(value_type = Object)]
    pub comments_count: CommentsCountMap,
    pub available_types: Vec<String>,
    pub available_districts: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateIssueRequest {
    #[schema(example = "Broken playground fence")]
    pub title: String,
    #[schema(example = "Problem")]
    pub issue_type: String,
    pub narrative: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub topic: Option<String>,
    pub government_level: Option<String>,
    pub federal_district: Option<String>,
    pub provincial_district: Option<String>,
    pub municipal_district: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub issue_type: Option<String>,
    pub narrative: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VoteRequest {
    /// +1 or -1
    #[schema(example = "1")]
    pub value: i16,
}

/// Refreshed totals returned after a vote lands.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoteSummary {
    pub net: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Possible issue errors
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Cache error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("Issue not found")]
    NotFound,

    #[error("Not authorized to perform this action")]
    Unauthorized,

    #[error("Account is restricted from posting")]
    Restricted,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<DbError> for IssueError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout(label) => Self::Timeout(label),
            DbError::Backend(e) => Self::DatabaseError(e),
        }
    }
}

/// Error response for the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueErrorResponse {
    /// Error message
    #[schema(example = "Issue not found")]
    pub error: String,

    /// Error code
    #[schema(example = "NOT_FOUND")]
    pub code: String,
}
