use crate::cache::redis::RedisCache;
use crate::db;
use crate::notification::model::{CleanupSummary, DigestSummary, NotificationError};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Read notifications are kept this long before the retention job removes
/// them; unread ones get twice the window.
const READ_RETENTION_DAYS: i64 = 30;
const HARD_RETENTION_DAYS: i64 = 60;

enum DigestOutcome {
    Inserted,
    Updated,
    NoActivity,
}

pub struct DigestService {
    pool: PgPool,
    redis_cache: Option<RedisCache>,
}

impl DigestService {
    pub fn new(pool: PgPool, redis_cache: Option<RedisCache>) -> Self {
        Self { pool, redis_cache }
    }

    /// Roll up unseen comment activity on bookmarked issues into one
    /// digest notification per (user, issue, day). A failure on one pair
    /// is logged and skipped; the run always returns a summary.
    pub async fn run_bookmark_digest(&self) -> DigestSummary {
        let profiles: Vec<(Uuid, Vec<Uuid>)> = match db::with_timeout(
            "bookmark profiles select",
            sqlx::query_as(
                "SELECT id, bookmarks FROM forum.profiles WHERE cardinality(bookmarks) > 0",
            )
            .fetch_all(&self.pool),
        )
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Bookmark digest could not list profiles: {}", e);
                return DigestSummary {
                    success: false,
                    processed: 0,
                    notifications_created: 0,
                };
            }
        };

        let processed = profiles.len() as i64;
        let mut notifications_created = 0i64;
        let mut touched_users: Vec<Uuid> = Vec::new();

        for (user_id, bookmarks) in &profiles {
            if !self.digest_enabled(*user_id).await {
                continue;
            }

            for issue_id in bookmarks {
                match self.digest_pair(*user_id, *issue_id).await {
                    Ok(DigestOutcome::Inserted) => {
                        notifications_created += 1;
                        touched_users.push(*user_id);
                    }
                    Ok(DigestOutcome::Updated) => touched_users.push(*user_id),
                    Ok(DigestOutcome::NoActivity) => {}
                    Err(e) => {
                        warn!(
                            "Bookmark digest failed for user {} issue {}: {}",
                            user_id, issue_id, e
                        );
                    }
                }
            }
        }

        if let Some(cache) = &self.redis_cache {
            // Pairs iterate per user, so duplicates are adjacent
            touched_users.dedup();
            let _ = cache.invalidate_unread_counts(&touched_users).await;
        }

        info!(
            "Bookmark digest processed {} users, created {} notifications",
            processed, notifications_created
        );

        DigestSummary {
            success: true,
            processed,
            notifications_created,
        }
    }

    async fn digest_enabled(&self, user_id: Uuid) -> bool {
        let enabled: Result<Option<bool>, _> = db::with_timeout(
            "settings select",
            sqlx::query_scalar(
                "SELECT bookmark_summary_enabled FROM forum.notification_settings WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await;

        match enabled {
            Ok(Some(enabled)) => enabled,
            // No settings row means the default: digests on
            Ok(None) => true,
            Err(e) => {
                warn!("Could not read digest settings for user {}: {}", user_id, e);
                false
            }
        }
    }

    /// One (user, bookmarked issue) pair: count comments the user has not
    /// seen and upsert the day's digest row when there are any.
    async fn digest_pair(
        &self,
        user_id: Uuid,
        issue_id: Uuid,
    ) -> Result<DigestOutcome, NotificationError> {
        let new_comments: i64 = db::with_timeout(
            "unseen comments count",
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM forum.comments
                WHERE issue_id = $1
                  AND created_at > COALESCE(
                      (SELECT last_seen_at FROM forum.last_seen_timestamps
                       WHERE user_id = $2 AND issue_id = $1),
                      'epoch'::TIMESTAMPTZ)
                "#,
            )
            .bind(issue_id)
            .bind(user_id)
            .fetch_one(&self.pool),
        )
        .await?;

        if new_comments == 0 {
            return Ok(DigestOutcome::NoActivity);
        }

        let issue_title: Option<String> = db::with_timeout(
            "issue title select",
            sqlx::query_scalar("SELECT title FROM forum.issues WHERE id = $1")
                .bind(issue_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        // The partial unique index keys digests by (user, issue, day); a
        // same-day re-run lands on the existing row, refreshes its count
        // and resurfaces it as unread. xmax = 0 only on a fresh insert.
        let inserted: bool = db::with_timeout(
            "digest upsert",
            sqlx::query_scalar(
                r#"
                INSERT INTO forum.notifications
                    (user_id, type, issue_id, actor_id, content_preview, aggregate_count, is_read, day_bucket)
                VALUES ($1, 'bookmark_summary', $2, NULL, $3, $4, FALSE, CURRENT_DATE)
                ON CONFLICT (user_id, issue_id, type, day_bucket) WHERE type = 'bookmark_summary'
                DO UPDATE SET aggregate_count = EXCLUDED.aggregate_count, is_read = FALSE
                RETURNING (xmax = 0)
                "#,
            )
            .bind(user_id)
            .bind(issue_id)
            .bind(issue_title)
            .bind(new_comments as i32)
            .fetch_one(&self.pool),
        )
        .await?;

        if inserted {
            Ok(DigestOutcome::Inserted)
        } else {
            Ok(DigestOutcome::Updated)
        }
    }

    /// Retention pass: read notifications expire after 30 days, everything
    /// else after 60.
    pub async fn cleanup_notifications(&self) -> CleanupSummary {
        let read_cutoff = Utc::now() - Duration::days(READ_RETENTION_DAYS);
        let hard_cutoff = Utc::now() - Duration::days(HARD_RETENTION_DAYS);

        let mut success = true;

        let deleted_read: Vec<Uuid> = match db::with_timeout(
            "read notifications delete",
            sqlx::query_scalar(
                "DELETE FROM forum.notifications WHERE is_read = TRUE AND created_at < $1 \
                 RETURNING user_id",
            )
            .bind(read_cutoff)
            .fetch_all(&self.pool),
        )
        .await
        {
            Ok(users) => users,
            Err(e) => {
                error!("Notification cleanup (read, 30d) failed: {}", e);
                success = false;
                Vec::new()
            }
        };

        let deleted_all: Vec<Uuid> = match db::with_timeout(
            "expired notifications delete",
            sqlx::query_scalar(
                "DELETE FROM forum.notifications WHERE created_at < $1 RETURNING user_id",
            )
            .bind(hard_cutoff)
            .fetch_all(&self.pool),
        )
        .await
        {
            Ok(users) => users,
            Err(e) => {
                error!("Notification cleanup (all, 60d) failed: {}", e);
                success = false;
                Vec::new()
            }
        };

        let summary = CleanupSummary {
            success,
            deleted_read_30d: deleted_read.len() as i64,
            deleted_all_60d: deleted_all.len() as i64,
        };

        // Only the hard cutoff can remove unread rows, so only those
        // users need their cached unread count dropped
        if let Some(cache) = &self.redis_cache {
            let mut users = deleted_all;
            users.sort_unstable();
            users.dedup();
            let _ = cache.invalidate_unread_counts(&users).await;
        }

        info!(
            "Notification cleanup removed {} read and {} expired rows",
            summary.deleted_read_30d, summary.deleted_all_60d
        );
        summary
    }
}
