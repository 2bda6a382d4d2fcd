use crate::db;
use crate::profile::model::{ProfileError, ProfileRecord, ProfileResponse};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

pub struct ProfileService {
    pool: PgPool,
}

impl ProfileService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Public display fields of a profile. The bookmark list is private,
    /// so it only appears when the viewer is the profile's owner.
    pub async fn get_profile(
        &self,
        profile_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<ProfileResponse, ProfileError> {
        let profile: Option<ProfileRecord> = db::with_timeout(
            "profile select",
            sqlx::query_as(
                "SELECT id, username, avatar_url, role, bookmarks, created_at \
                 FROM forum.profiles WHERE id = $1",
            )
            .bind(profile_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        let profile = profile.ok_or(ProfileError::NotFound)?;
        let is_owner = viewer == Some(profile.id);

        Ok(ProfileResponse {
            id: profile.id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            role: profile.role,
            created_at: profile.created_at,
            bookmarks: is_owner.then_some(profile.bookmarks),
        })
    }

    /// Add an issue to the user's bookmarks. Adding one that is already
    /// there changes nothing.
    pub async fn add_bookmark(
        &self,
        user_id: Uuid,
        issue_id: Uuid,
    ) -> Result<Vec<Uuid>, ProfileError> {
        let bookmarks: Option<Vec<Uuid>> = db::with_timeout(
            "bookmark add",
            sqlx::query_scalar(
                r#"
                UPDATE forum.profiles
                SET bookmarks = CASE
                    WHEN $1 = ANY(bookmarks) THEN bookmarks
                    ELSE array_append(bookmarks, $1)
                END
                WHERE id = $2
                RETURNING bookmarks
                "#,
            )
            .bind(issue_id)
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        let bookmarks = bookmarks.ok_or(ProfileError::Unauthorized)?;

        info!("User {} bookmarked issue {}", user_id, issue_id);
        Ok(bookmarks)
    }

    /// Remove an issue from the user's bookmarks. Removing one that is
    /// not there is a no-op.
    pub async fn remove_bookmark(
        &self,
        user_id: Uuid,
        issue_id: Uuid,
    ) -> Result<Vec<Uuid>, ProfileError> {
        let bookmarks: Option<Vec<Uuid>> = db::with_timeout(
            "bookmark remove",
            sqlx::query_scalar(
                "UPDATE forum.profiles SET bookmarks = array_remove(bookmarks, $1) \
                 WHERE id = $2 RETURNING bookmarks",
            )
            .bind(issue_id)
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        let bookmarks = bookmarks.ok_or(ProfileError::Unauthorized)?;

        info!("User {} removed bookmark for issue {}", user_id, issue_id);
        Ok(bookmarks)
    }
}
