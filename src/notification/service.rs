use crate::cache::redis::RedisCache;
use crate::db;
use crate::notification::model::{
    NotificationError, NotificationListResponse, NotificationRecord, NotificationSettings,
    NotificationType, UpdateSettingsRequest,
};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Hard page-size cap for the notification list.
pub const MAX_LIST_LIMIT: i64 = 50;
const DEFAULT_LIST_LIMIT: i64 = 20;

/// Content previews carry at most this many characters of the comment body.
const PREVIEW_MAX_CHARS: usize = 100;

const NOTIFICATION_COLUMNS: &str = r#"
    n.id, n.type AS notification_type, n.issue_id, n.comment_id, n.actor_id,
    n.content_preview, n.aggregate_count, n.is_read, n.created_at,
    i.title AS issue_title,
    p.username AS actor_username, p.avatar_url AS actor_avatar_url
"#;

const NOTIFICATION_JOINS: &str = r#"
    FROM forum.notifications n
    LEFT JOIN forum.issues i ON i.id = n.issue_id
    LEFT JOIN forum.profiles p ON p.id = n.actor_id
"#;

pub struct NotificationService {
    pool: PgPool,
    redis_cache: Option<RedisCache>,
}

impl NotificationService {
    pub fn new(pool: PgPool, redis_cache: Option<RedisCache>) -> Self {
        Self { pool, redis_cache }
    }

    /// Fan out notifications for a freshly created comment. A top-level
    /// comment notifies the issue author; a reply notifies the parent
    /// comment's author only, never the issue author as well.
    pub async fn notify_on_comment(
        &self,
        comment_id: Uuid,
        issue_id: Uuid,
        parent_id: Option<Uuid>,
        actor_id: Uuid,
        content: &str,
    ) -> Result<(), NotificationError> {
        let issue_author: Option<Uuid> = db::with_timeout(
            "issue author select",
            sqlx::query_scalar("SELECT author_id FROM forum.issues WHERE id = $1")
                .bind(issue_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        let issue_author = match issue_author {
            Some(author_id) => author_id,
            None => {
                warn!("Issue {} missing during notification fan-out", issue_id);
                return Ok(());
            }
        };

        let preview = content_preview(content);

        match parent_id {
            None => {
                self.attempt_notification(
                    issue_author,
                    NotificationType::CommentOnPost,
                    issue_id,
                    Some(comment_id),
                    actor_id,
                    &preview,
                )
                .await?;
            }
            Some(parent_id) => {
                let parent_author: Option<Uuid> = db::with_timeout(
                    "parent comment select",
                    sqlx::query_scalar("SELECT author_id FROM forum.comments WHERE id = $1")
                        .bind(parent_id)
                        .fetch_optional(&self.pool),
                )
                .await?;

                if let Some(parent_author) = parent_author {
                    self.attempt_notification(
                        parent_author,
                        NotificationType::ReplyToComment,
                        issue_id,
                        Some(comment_id),
                        actor_id,
                        &preview,
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    /// Insert one notification unless the recipient is the actor or has
    /// the type toggled off.
    async fn attempt_notification(
        &self,
        recipient_id: Uuid,
        notification_type: NotificationType,
        issue_id: Uuid,
        comment_id: Option<Uuid>,
        actor_id: Uuid,
        content_preview: &str,
    ) -> Result<(), NotificationError> {
        let settings = self.get_settings(recipient_id).await?;
        if !should_notify(recipient_id, actor_id, &settings, notification_type) {
            return Ok(());
        }

        db::with_timeout(
            "notification insert",
            sqlx::query(
                r#"
                INSERT INTO forum.notifications
                    (user_id, type, issue_id, comment_id, actor_id, content_preview)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(recipient_id)
            .bind(notification_type.as_str())
            .bind(issue_id)
            .bind(comment_id)
            .bind(actor_id)
            .bind(content_preview)
            .execute(&self.pool),
        )
        .await?;

        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_unread_count(recipient_id).await;
        }

        info!(
            "Created {} notification for user {}",
            notification_type.as_str(),
            recipient_id
        );
        Ok(())
    }

    /// A user's notifications, newest first, joined with issue titles and
    /// actor display fields.
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
        unread_only: bool,
    ) -> Result<NotificationListResponse, NotificationError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let filter = if unread_only {
            "AND n.is_read = FALSE"
        } else {
            ""
        };
        let query = format!(
            "SELECT {} {} WHERE n.user_id = $1 {} ORDER BY n.created_at DESC LIMIT $2 OFFSET $3",
            NOTIFICATION_COLUMNS, NOTIFICATION_JOINS, filter
        );

        let notifications = db::with_timeout(
            "notifications select",
            sqlx::query_as::<_, NotificationRecord>(&query)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
        )
        .await?;

        let unread_count = self.unread_count(user_id).await?;
        let has_more = notifications.len() as i64 == limit;

        Ok(NotificationListResponse {
            notifications,
            unread_count,
            has_more,
        })
    }

    /// Unread notification count, served from Redis when the cached value
    /// is still fresh.
    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, NotificationError> {
        if let Some(cache) = &self.redis_cache {
            match cache.get_unread_count(user_id).await {
                Ok(Some(count)) => return Ok(count),
                Ok(None) => {}
                Err(e) => {
                    error!("Error reading cached unread count: {}", e);
                    // Fall through to DB retrieval
                }
            }
        }

        let count: i64 = db::with_timeout(
            "unread count",
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM forum.notifications WHERE user_id = $1 AND is_read = FALSE",
            )
            .bind(user_id)
            .fetch_one(&self.pool),
        )
        .await?;

        if let Some(cache) = &self.redis_cache {
            let _ = cache.cache_unread_count(user_id, count).await;
        }

        Ok(count)
    }

    /// Mark one notification read. Only the recipient may do this.
    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), NotificationError> {
        let result = db::with_timeout(
            "notification update",
            sqlx::query(
                "UPDATE forum.notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2",
            )
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish someone else's notification from a missing one
            let exists: bool = db::with_timeout(
                "notification exists",
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM forum.notifications WHERE id = $1)",
                )
                .bind(notification_id)
                .fetch_one(&self.pool),
            )
            .await?;

            if exists {
                return Err(NotificationError::Unauthorized);
            }
            return Err(NotificationError::NotFound);
        }

        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_unread_count(user_id).await;
        }

        Ok(())
    }

    /// Mark every unread notification of a user read.
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<(), NotificationError> {
        db::with_timeout(
            "notifications update",
            sqlx::query(
                "UPDATE forum.notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
            )
            .bind(user_id)
            .execute(&self.pool),
        )
        .await?;

        if let Some(cache) = &self.redis_cache {
            let _ = cache.invalidate_unread_count(user_id).await;
        }

        info!("Marked all notifications read for user {}", user_id);
        Ok(())
    }

    /// The user's notification toggles; a missing row means the defaults.
    pub async fn get_settings(
        &self,
        user_id: Uuid,
    ) -> Result<NotificationSettings, NotificationError> {
        let settings: Option<NotificationSettings> = db::with_timeout(
            "settings select",
            sqlx::query_as(
                "SELECT comment_on_post_enabled, reply_to_comment_enabled, bookmark_summary_enabled \
                 FROM forum.notification_settings WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(settings.unwrap_or_default())
    }

    /// Update the provided toggles, creating the settings row on first use.
    pub async fn update_settings(
        &self,
        user_id: Uuid,
        update: UpdateSettingsRequest,
    ) -> Result<NotificationSettings, NotificationError> {
        db::with_timeout("settings update", async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT INTO forum.notification_settings (user_id) VALUES ($1) \
                 ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            if let Some(enabled) = update.comment_on_post_enabled {
                sqlx::query(
                    "UPDATE forum.notification_settings SET comment_on_post_enabled = $1 WHERE user_id = $2",
                )
                .bind(enabled)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }

            if let Some(enabled) = update.reply_to_comment_enabled {
                sqlx::query(
                    "UPDATE forum.notification_settings SET reply_to_comment_enabled = $1 WHERE user_id = $2",
                )
                .bind(enabled)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }

            if let Some(enabled) = update.bookmark_summary_enabled {
                sqlx::query(
                    "UPDATE forum.notification_settings SET bookmark_summary_enabled = $1 WHERE user_id = $2",
                )
                .bind(enabled)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<(), sqlx::Error>(())
        })
        .await?;

        info!("Updated notification settings for user {}", user_id);
        self.get_settings(user_id).await
    }

    /// Record that the user viewed an issue; the bookmark digest counts
    /// comments newer than this timestamp.
    pub async fn track_visit(
        &self,
        user_id: Uuid,
        issue_id: Uuid,
    ) -> Result<(), NotificationError> {
        db::with_timeout(
            "last seen upsert",
            sqlx::query(
                r#"
                INSERT INTO forum.last_seen_timestamps (user_id, issue_id, last_seen_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (user_id, issue_id) DO UPDATE SET last_seen_at = NOW()
                "#,
            )
            .bind(user_id)
            .bind(issue_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }
}

/// Whether an attempted notification should actually be written: never for
/// one's own actions, never against a disabled toggle.
fn should_notify(
    recipient_id: Uuid,
    actor_id: Uuid,
    settings: &NotificationSettings,
    notification_type: NotificationType,
) -> bool {
    recipient_id != actor_id && settings.allows(notification_type)
}

/// First `PREVIEW_MAX_CHARS` characters of the comment body, cut on a char
/// boundary, HTML-escaped.
fn content_preview(content: &str) -> String {
    let cut = content
        .char_indices()
        .nth(PREVIEW_MAX_CHARS)
        .map(|(idx, _)| idx)
        .unwrap_or(content.len());
    html_escape::encode_safe(&content[..cut]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn self_actions_never_notify() {
        let user = uuid(1);
        let settings = NotificationSettings::default();
        assert!(!should_notify(
            user,
            user,
            &settings,
            NotificationType::CommentOnPost
        ));
        assert!(!should_notify(
            user,
            user,
            &settings,
            NotificationType::ReplyToComment
        ));
    }

    #[test]
    fn disabled_toggle_skips_that_type_only() {
        let settings = NotificationSettings {
            comment_on_post_enabled: false,
            ..NotificationSettings::default()
        };
        assert!(!should_notify(
            uuid(1),
            uuid(2),
            &settings,
            NotificationType::CommentOnPost
        ));
        assert!(should_notify(
            uuid(1),
            uuid(2),
            &settings,
            NotificationType::ReplyToComment
        ));
    }

    #[test]
    fn default_settings_allow_everything() {
        let settings = NotificationSettings::default();
        assert!(should_notify(
            uuid(1),
            uuid(2),
            &settings,
            NotificationType::CommentOnPost
        ));
        assert!(should_notify(
            uuid(1),
            uuid(2),
            &settings,
            NotificationType::ReplyToComment
        ));
        assert!(should_notify(
            uuid(1),
            uuid(2),
            &settings,
            NotificationType::BookmarkSummary
        ));
    }

    #[test]
    fn short_content_previews_whole() {
        assert_eq!(content_preview("a short comment"), "a short comment");
    }

    #[test]
    fn preview_truncates_at_100_chars() {
        let content = "x".repeat(250);
        let preview = content_preview(&content);
        assert_eq!(preview.chars().count(), 100);
    }

    #[test]
    fn preview_cuts_multibyte_content_on_a_char_boundary() {
        let content = "é".repeat(150);
        let preview = content_preview(&content);
        assert_eq!(preview.chars().count(), 100);
        assert!(preview.chars().all(|c| c == 'é'));
    }

    #[test]
    fn preview_escapes_html() {
        let preview = content_preview("<script>alert(1)</script>");
        assert!(!preview.contains('<'));
        assert!(preview.contains("&lt;script&gt;"));
    }

    #[test]
    fn preview_escapes_after_truncation() {
        // Escaping may lengthen the string; the 100-char cut applies to
        // the raw body, not the escaped output.
        let content = format!("{}<b>", "a".repeat(99));
        let preview = content_preview(&content);
        assert!(preview.starts_with(&"a".repeat(99)));
        assert!(preview.ends_with("&lt;"));
    }
}
