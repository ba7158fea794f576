use anyhow::Context;
use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::db::{DeletePolicy, PgStore};
use crate::resumes::repo_types::{Resume, ResumeMetadata, ResumeRow};

#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Live (active) resume including its PDF payload.
    async fn find_active_resume(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Resume>>;
    /// Any stored resume regardless of the active flag.
    async fn find_resume(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Resume>>;
    /// Active resumes without PDF payloads, newest `dateAdded` first, optionally
    /// limited to those modified after `since`.
    async fn list_active_resumes(
        &self,
        user_id: &str,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Vec<Resume>>;
    async fn count_active_resumes(&self, user_id: &str) -> anyhow::Result<i64>;
    async fn insert_resume(&self, resume: &Resume) -> anyhow::Result<()>;
    /// Overwrites the stored record; a `None` PDF keeps the stored payload.
    async fn replace_resume(&self, resume: &Resume) -> anyhow::Result<bool>;
    /// Deletes per [`Resume::DELETE_POLICY`]; only live resumes are affected.
    async fn delete_resume(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;
    async fn latest_resume_update(&self, user_id: &str) -> anyhow::Result<Option<OffsetDateTime>>;
}

const RESUME_COLUMNS: &str = "user_id, id, name, filename, file_size, mime_type, pdf_data, \
                              date_added, last_modified, is_active, metadata";
const RESUME_COLUMNS_NO_PDF: &str = "user_id, id, name, filename, file_size, mime_type, \
                                     NULL::text AS pdf_data, date_added, last_modified, is_active, metadata";

#[async_trait]
impl ResumeStore for PgStore {
    async fn find_active_resume(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Resume>> {
        let row = sqlx::query_as::<_, ResumeRow>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = $1 AND id = $2 AND is_active"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find active resume")?;
        Ok(row.map(Resume::from))
    }

    async fn find_resume(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Resume>> {
        let row = sqlx::query_as::<_, ResumeRow>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find resume")?;
        Ok(row.map(Resume::from))
    }

    async fn list_active_resumes(
        &self,
        user_id: &str,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Vec<Resume>> {
        let rows = sqlx::query_as::<_, ResumeRow>(&format!(
            r#"
            SELECT {RESUME_COLUMNS_NO_PDF}
              FROM resumes
             WHERE user_id = $1 AND is_active
               AND ($2::timestamptz IS NULL OR last_modified > $2)
             ORDER BY date_added DESC, id DESC
            "#
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("list active resumes")?;
        Ok(rows.into_iter().map(Resume::from).collect())
    }

    async fn count_active_resumes(&self, user_id: &str) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resumes WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("count active resumes")?;
        Ok(n)
    }

    async fn insert_resume(&self, resume: &Resume) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO resumes ({RESUME_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(&resume.user_id)
        .bind(&resume.id)
        .bind(&resume.name)
        .bind(&resume.filename)
        .bind(resume.file_size)
        .bind(&resume.mime_type)
        .bind(&resume.pdf_data)
        .bind(resume.date_added)
        .bind(resume.last_modified)
        .bind(resume.is_active)
        .bind(Json(&resume.metadata))
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert resume {}", resume.id))?;
        Ok(())
    }

    async fn replace_resume(&self, resume: &Resume) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE resumes
               SET name = $3, filename = $4, file_size = $5, mime_type = $6,
                   pdf_data = COALESCE($7, pdf_data), date_added = $8, last_modified = $9,
                   is_active = $10, metadata = $11
             WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(&resume.user_id)
        .bind(&resume.id)
        .bind(&resume.name)
        .bind(&resume.filename)
        .bind(resume.file_size)
        .bind(&resume.mime_type)
        .bind(&resume.pdf_data)
        .bind(resume.date_added)
        .bind(resume.last_modified)
        .bind(resume.is_active)
        .bind(Json::<&ResumeMetadata>(&resume.metadata))
        .execute(&self.pool)
        .await
        .with_context(|| format!("replace resume {}", resume.id))?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_resume(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        let sql = match Resume::DELETE_POLICY {
            DeletePolicy::Soft => {
                "UPDATE resumes SET is_active = FALSE WHERE user_id = $1 AND id = $2 AND is_active"
            }
            DeletePolicy::Hard => "DELETE FROM resumes WHERE user_id = $1 AND id = $2",
        };
        let res = sqlx::query(sql)
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete resume")?;
        Ok(res.rows_affected() > 0)
    }

    async fn latest_resume_update(&self, user_id: &str) -> anyhow::Result<Option<OffsetDateTime>> {
        let latest: Option<OffsetDateTime> = sqlx::query_scalar(
            "SELECT MAX(last_modified) FROM resumes WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("latest resume update")?;
        Ok(latest)
    }
}
