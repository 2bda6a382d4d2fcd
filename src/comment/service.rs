use crate::cache::redis::RedisCache;
use crate::comment::model::{
    CommentError, CommentListResponse, CommentRecord, CreateCommentRequest,
};
use crate::db;
use crate::notification::service::NotificationService;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.issue_id, c.parent_id, c.author_id, c.content, c.created_at,
    p.username AS author_username, p.role AS author_role,
    p.avatar_url AS author_avatar_url
"#;

const COMMENT_JOINS: &str = r#"
    FROM forum.comments c
    LEFT JOIN forum.profiles p ON p.id = c.author_id
"#;

pub struct CommentService {
    pool: PgPool,
    redis_cache: Option<RedisCache>,
    notification_service: Arc<NotificationService>,
}

impl CommentService {
    pub fn new(
        pool: PgPool,
        redis_cache: Option<RedisCache>,
        notification_service: Arc<NotificationService>,
    ) -> Self {
        Self {
            pool,
            redis_cache,
            notification_service,
        }
    }

    /// Create a comment and fan out the resulting notifications.
    /// Restricted profiles cannot comment.
    pub async fn create_comment(
        &self,
        issue_id: Uuid,
        author_id: Uuid,
        comment: CreateCommentRequest,
    ) -> Result<CommentRecord, CommentError> {
        self.ensure_not_restricted(author_id).await?;

        let issue_exists: bool = db::with_timeout(
            "issue exists",
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM forum.issues WHERE id = $1)")
                .bind(issue_id)
                .fetch_one(&self.pool),
        )
        .await?;

        if !issue_exists {
            return Err(CommentError::IssueNotFound);
        }

        if let Some(parent_id) = comment.parent_id {
            let parent_issue: Option<Uuid> = db::with_timeout(
                "parent comment select",
                sqlx::query_scalar("SELECT issue_id FROM forum.comments WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

            match parent_issue {
                Some(parent_issue) if parent_issue == issue_id => {}
                Some(_) => {
                    return Err(CommentError::ValidationError(
                        "Parent comment belongs to a different issue".to_string(),
                    ))
                }
                None => return Err(CommentError::ParentNotFound),
            }
        }

        let comment_id: Uuid = db::with_timeout(
            "comment insert",
            sqlx::query_scalar(
                r#"
                INSERT INTO forum.comments (issue_id, parent_id, author_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(issue_id)
            .bind(comment.parent_id)
            .bind(author_id)
            .bind(&comment.content)
            .fetch_one(&self.pool),
        )
        .await?;

        // A fan-out failure never rolls back the comment itself
        if let Err(e) = self
            .notification_service
            .notify_on_comment(
                comment_id,
                issue_id,
                comment.parent_id,
                author_id,
                &comment.content,
            )
            .await
        {
            error!("Notification fan-out failed for comment {}: {}", comment_id, e);
        }

        // Invalidate the feed snapshot; its comment counts are stale now
        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_feed_snapshot().await;
        }

        info!("Created comment {} on issue {}", comment_id, issue_id);
        self.get_comment(comment_id).await
    }

    /// All comments for an issue, oldest first, with author display
    /// fields. An unknown issue id simply lists as empty.
    pub async fn list_comments(&self, issue_id: Uuid) -> Result<CommentListResponse, CommentError> {
        let query = format!(
            "SELECT {} {} WHERE c.issue_id = $1 ORDER BY c.created_at ASC",
            COMMENT_COLUMNS, COMMENT_JOINS
        );

        let comments = db::with_timeout(
            "comment list",
            sqlx::query_as::<_, CommentRecord>(&query)
                .bind(issue_id)
                .fetch_all(&self.pool),
        )
        .await?;

        let total_count = comments.len() as i64;

        Ok(CommentListResponse {
            comments,
            total_count,
        })
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<CommentRecord, CommentError> {
        let query = format!("SELECT {} {} WHERE c.id = $1", COMMENT_COLUMNS, COMMENT_JOINS);

        let comment = db::with_timeout(
            "comment select",
            sqlx::query_as::<_, CommentRecord>(&query)
                .bind(comment_id)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(comment)
    }

    async fn ensure_not_restricted(&self, user_id: Uuid) -> Result<(), CommentError> {
        let restricted: Option<bool> = db::with_timeout(
            "profile select",
            sqlx::query_scalar("SELECT restricted FROM forum.profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        match restricted {
            Some(true) => Err(CommentError::Restricted),
            Some(false) => Ok(()),
            None => Err(CommentError::Unauthorized),
        }
    }
}
