use anyhow::Context;
use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::repo_types::{PreferencesPatch, User, UserRow};
use crate::db::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Returns false when the user id or email is already taken.
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool>;
    /// Bumps `lastActive`; unknown users are ignored.
    async fn touch_user(&self, user_id: &str, at: OffsetDateTime) -> anyhow::Result<()>;
    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> anyhow::Result<Option<User>>;
}

const USER_COLUMNS: &str = "user_id, email, password_hash, created_at, last_active, \
                            auto_detect, default_status, email_notifications";

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("find user")?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, password_hash, created_at, last_active,
                               auto_detect, default_status, email_notifications)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.last_active)
        .bind(user.preferences.auto_detect)
        .bind(user.preferences.default_status.as_str())
        .bind(user.preferences.email_notifications)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("insert user"),
        }
    }

    async fn touch_user(&self, user_id: &str, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_active = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .context("touch user")?;
        Ok(())
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET auto_detect = COALESCE($2, auto_detect),
                   default_status = COALESCE($3, default_status),
                   email_notifications = COALESCE($4, email_notifications)
             WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(patch.auto_detect)
        .bind(patch.default_status.map(|s| s.as_str()))
        .bind(patch.email_notifications)
        .fetch_optional(&self.pool)
        .await
        .context("update preferences")?;
        row.map(User::try_from).transpose()
    }
}
