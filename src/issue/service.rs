use crate::cache::redis::RedisCache;
use crate::db;
use crate::district::model::DistrictLevel;
use crate::issue::aggregator;
use crate::issue::model::{
    CreateIssueRequest, FeedFilters, FeedResponse, FeedSort, IssueError, IssueRecord,
    UpdateIssueRequest, VoteRow, VoteSummary,
};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The feed serves the most recent issues only; older ones are reachable
/// through the district pages.
pub const FEED_LIMIT: i64 = 50;

const ISSUE_COLUMNS: &str = r#"
    i.id, i.title, i.issue_type, i.narrative, i.media_url, i.media_type,
    i.author_id, i.topic, i.government_level, i.federal_district,
    i.provincial_district, i.municipal_district, i.location_lat,
    i.location_lng, i.address, i.created_at,
    p.username AS author_username, p.role AS author_role,
    p.avatar_url AS author_avatar_url,
    md.city AS author_city, pd.province AS author_province
"#;

const ISSUE_JOINS: &str = r#"
    FROM forum.issues i
    LEFT JOIN forum.profiles p ON p.id = i.author_id
    LEFT JOIN forum.municipal_districts md ON md.id = p.municipal_district_id
    LEFT JOIN forum.provincial_districts pd ON pd.id = p.provincial_district_id
"#;

pub struct IssueService {
    pool: PgPool,
    redis_cache: Option<RedisCache>,
}

impl IssueService {
    pub fn new(pool: PgPool, redis_cache: Option<RedisCache>) -> Self {
        Self { pool, redis_cache }
    }

    /// Assemble the aggregated feed: recent issues joined with author
    /// fields, raw votes and comment rows fetched in parallel, then the
    /// pure aggregation pass over the lot.
    pub async fn get_feed(
        &self,
        filters: FeedFilters,
        sort: FeedSort,
    ) -> Result<FeedResponse, IssueError> {
        // Only the unfiltered newest-first view is snapshotted; filtered
        // views recompute from the same base rows.
        let default_view = filters.is_empty() && sort == FeedSort::New;

        if default_view {
            if let Some(cache) = &self.redis_cache {
                if let Ok(Some(cached)) = cache.get_feed_snapshot().await {
                    match serde_json::from_str::<FeedResponse>(&cached) {
                        Ok(feed) => return Ok(feed),
                        Err(e) => {
                            error!("Error deserializing cached feed snapshot: {}", e);
                            // Fall through to DB retrieval
                        }
                    }
                }
            }
        }

        let issues = self.fetch_recent_issues().await?;
        let issue_ids: Vec<Uuid> = issues.iter().map(|issue| issue.id).collect();
        let (votes, comment_issue_ids) = self.fetch_engagement(&issue_ids).await;

        let feed = aggregator::aggregate(issues, &votes, &comment_issue_ids, &filters, sort);
        let response = FeedResponse {
            issues: feed.issues,
            votes: feed.votes,
            vote_breakdown: feed.vote_breakdown,
            comments_count: feed.comments_count,
            available_types: feed.available_types,
            available_districts: feed.available_districts,
        };

        if default_view {
            if let Some(cache) = &self.redis_cache {
                if let Ok(json_data) = serde_json::to_string(&response) {
                    let _ = cache.cache_feed_snapshot(&json_data).await;
                }
            }
        }

        Ok(response)
    }

    /// The feed for one district page: exact scope, both the level and the
    /// level's district column must match. The query-string filters still
    /// apply on top.
    pub async fn district_feed(
        &self,
        level: DistrictLevel,
        district: &str,
        filters: FeedFilters,
        sort: FeedSort,
    ) -> Result<FeedResponse, IssueError> {
        let issues = self.fetch_district_issues(level, district).await?;
        let issue_ids: Vec<Uuid> = issues.iter().map(|issue| issue.id).collect();
        let (votes, comment_issue_ids) = self.fetch_engagement(&issue_ids).await;

        let feed = aggregator::aggregate(issues, &votes, &comment_issue_ids, &filters, sort);
        Ok(FeedResponse {
            issues: feed.issues,
            votes: feed.votes,
            vote_breakdown: feed.vote_breakdown,
            comments_count: feed.comments_count,
            available_types: feed.available_types,
            available_districts: feed.available_districts,
        })
    }

    /// Get a single issue with its author display fields.
    pub async fn get_issue(&self, issue_id: Uuid) -> Result<IssueRecord, IssueError> {
        let query = format!(
            "SELECT {} {} WHERE i.id = $1",
            ISSUE_COLUMNS, ISSUE_JOINS
        );

        let issue = db::with_timeout(
            "issue select",
            sqlx::query_as::<_, IssueRecord>(&query)
                .bind(issue_id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(IssueError::NotFound)?;

        Ok(issue)
    }

    /// Create a new issue. Restricted profiles cannot post.
    pub async fn create_issue(
        &self,
        author_id: Uuid,
        issue: CreateIssueRequest,
    ) -> Result<IssueRecord, IssueError> {
        self.ensure_not_restricted(author_id).await?;

        let issue_id: Uuid = db::with_timeout(
            "issue insert",
            sqlx::query_scalar(
                r#"
                INSERT INTO forum.issues (
                    title, issue_type, narrative, media_url, media_type,
                    author_id, topic, government_level, federal_district,
                    provincial_district, municipal_district, location_lat,
                    location_lng, address
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                RETURNING id
                "#,
            )
            .bind(&issue.title)
            .bind(&issue.issue_type)
            .bind(&issue.narrative)
            .bind(&issue.media_url)
            .bind(&issue.media_type)
            .bind(author_id)
            .bind(&issue.topic)
            .bind(&issue.government_level)
            .bind(&issue.federal_district)
            .bind(&issue.provincial_district)
            .bind(&issue.municipal_district)
            .bind(issue.location_lat)
            .bind(issue.location_lng)
            .bind(&issue.address)
            .fetch_one(&self.pool),
        )
        .await?;

        // Invalidate the feed snapshot
        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_feed_snapshot().await;
        }

        info!("Created issue with ID: {}", issue_id);
        self.get_issue(issue_id).await
    }

    /// Update an issue's editable fields. Author only.
    pub async fn update_issue(
        &self,
        issue_id: Uuid,
        user_id: Uuid,
        update: UpdateIssueRequest,
    ) -> Result<IssueRecord, IssueError> {
        let author_id: Option<Uuid> = db::with_timeout(
            "issue author select",
            sqlx::query_scalar("SELECT author_id FROM forum.issues WHERE id = $1")
                .bind(issue_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        let author_id = author_id.ok_or(IssueError::NotFound)?;
        if author_id != user_id {
            return Err(IssueError::Unauthorized);
        }

        db::with_timeout("issue update", async {
            let mut tx = self.pool.begin().await?;

            if let Some(title) = &update.title {
                sqlx::query("UPDATE forum.issues SET title = $1 WHERE id = $2")
                    .bind(title)
                    .bind(issue_id)
                    .execute(&mut *tx)
                    .await?;
            }

            if let Some(issue_type) = &update.issue_type {
                sqlx::query("UPDATE forum.issues SET issue_type = $1 WHERE id = $2")
                    .bind(issue_type)
                    .bind(issue_id)
                    .execute(&mut *tx)
                    .await?;
            }

            if let Some(narrative) = &update.narrative {
                sqlx::query("UPDATE forum.issues SET narrative = $1 WHERE id = $2")
                    .bind(narrative)
                    .bind(issue_id)
                    .execute(&mut *tx)
                    .await?;
            }

            if let Some(topic) = &update.topic {
                sqlx::query("UPDATE forum.issues SET topic = $1 WHERE id = $2")
                    .bind(topic)
                    .bind(issue_id)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok::<(), sqlx::Error>(())
        })
        .await?;

        // Invalidate the feed snapshot
        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_feed_snapshot().await;
        }

        info!("Updated issue {}", issue_id);
        self.get_issue(issue_id).await
    }

    /// Record a vote. An upsert on (issue_id, voter_id): a changed value
    /// overwrites, an identical value is a no-op, votes are never removed.
    pub async fn vote(
        &self,
        issue_id: Uuid,
        voter_id: Uuid,
        value: i16,
    ) -> Result<VoteSummary, IssueError> {
        let exists: bool = db::with_timeout(
            "issue exists",
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM forum.issues WHERE id = $1)")
                .bind(issue_id)
                .fetch_one(&self.pool),
        )
        .await?;

        if !exists {
            return Err(IssueError::NotFound);
        }

        db::with_timeout(
            "vote upsert",
            sqlx::query(
                r#"
                INSERT INTO forum.votes (issue_id, voter_id, value)
                VALUES ($1, $2, $3)
                ON CONFLICT (issue_id, voter_id) DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(issue_id)
            .bind(voter_id)
            .bind(value)
            .execute(&self.pool),
        )
        .await?;

        // Invalidate the feed snapshot
        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_feed_snapshot().await;
        }

        info!("Vote recorded for issue {} by user {}", issue_id, voter_id);
        self.vote_summary(issue_id).await
    }

    /// Refreshed vote totals for one issue.
    pub async fn vote_summary(&self, issue_id: Uuid) -> Result<VoteSummary, IssueError> {
        let (net, upvotes, downvotes): (i64, i64, i64) = db::with_timeout(
            "vote totals",
            sqlx::query_as(
                r#"
                SELECT COALESCE(SUM(value), 0)::BIGINT,
                       COUNT(*) FILTER (WHERE value = 1),
                       COUNT(*) FILTER (WHERE value = -1)
                FROM forum.votes
                WHERE issue_id = $1
                "#,
            )
            .bind(issue_id)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(VoteSummary {
            net,
            upvotes,
            downvotes,
        })
    }

    async fn fetch_recent_issues(&self) -> Result<Vec<IssueRecord>, IssueError> {
        let query = format!(
            "SELECT {} {} ORDER BY i.created_at DESC LIMIT $1",
            ISSUE_COLUMNS, ISSUE_JOINS
        );

        let issues = db::with_timeout(
            "issues select",
            sqlx::query_as::<_, IssueRecord>(&query)
                .bind(FEED_LIMIT)
                .fetch_all(&self.pool),
        )
        .await?;

        Ok(issues)
    }

    async fn fetch_district_issues(
        &self,
        level: DistrictLevel,
        district: &str,
    ) -> Result<Vec<IssueRecord>, IssueError> {
        // district_column() yields a fixed identifier per level, never
        // caller input.
        let query = format!(
            "SELECT {} {} WHERE i.government_level = $1 AND i.{} = $2 \
             ORDER BY i.created_at DESC LIMIT $3",
            ISSUE_COLUMNS,
            ISSUE_JOINS,
            level.district_column()
        );

        let issues = db::with_timeout(
            "issues select",
            sqlx::query_as::<_, IssueRecord>(&query)
                .bind(level.as_str())
                .bind(district)
                .bind(FEED_LIMIT)
                .fetch_all(&self.pool),
        )
        .await?;

        Ok(issues)
    }

    /// Fetch raw votes and comment rows for the given issues, in parallel.
    /// Either query failing degrades that side to zero counts rather than
    /// dropping issues from the feed.
    async fn fetch_engagement(&self, issue_ids: &[Uuid]) -> (Vec<VoteRow>, Vec<Uuid>) {
        if issue_ids.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let votes_query = sqlx::query_as::<_, VoteRow>(
            "SELECT issue_id, value FROM forum.votes WHERE issue_id = ANY($1)",
        )
        .bind(issue_ids)
        .fetch_all(&self.pool);

        let comments_query = sqlx::query_scalar::<_, Uuid>(
            "SELECT issue_id FROM forum.comments WHERE issue_id = ANY($1)",
        )
        .bind(issue_ids)
        .fetch_all(&self.pool);

        let (votes, comments) = tokio::join!(
            db::with_timeout("votes select", votes_query),
            db::with_timeout("comments select", comments_query),
        );

        let votes = match votes {
            Ok(rows) => rows,
            Err(e) => {
                warn!("votes select failed, degrading to zero counts: {}", e);
                Vec::new()
            }
        };

        let comment_issue_ids = match comments {
            Ok(rows) => rows,
            Err(e) => {
                warn!("comments select failed, degrading to zero counts: {}", e);
                Vec::new()
            }
        };

        (votes, comment_issue_ids)
    }

    async fn ensure_not_restricted(&self, user_id: Uuid) -> Result<(), IssueError> {
        let restricted: Option<bool> = db::with_timeout(
            "profile select",
            sqlx::query_scalar("SELECT restricted FROM forum.profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        match restricted {
            Some(true) => Err(IssueError::Restricted),
            Some(false) => Ok(()),
            None => Err(IssueError::Unauthorized),
        }
    }
}
