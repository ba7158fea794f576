use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::analytics::pipeline::{Bucket, GroupCount, GroupKey, GroupOrder, GroupValue};
use crate::applications::{
    query::{ApplicationFilter, ApplicationQuery, TextScope},
    repo_types::{Application, ApplicationRow},
};
use crate::db::{like_pattern, DeletePolicy, PgStore};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn find_application(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Application>>;
    async fn list_applications(
        &self,
        user_id: &str,
        query: &ApplicationQuery,
    ) -> anyhow::Result<Vec<Application>>;
    async fn count_applications(&self, user_id: &str, filter: &ApplicationFilter) -> anyhow::Result<i64>;
    async fn insert_application(&self, app: &Application) -> anyhow::Result<()>;
    /// Overwrites the stored record keyed by `(user_id, id)`. Returns false when absent.
    async fn replace_application(&self, app: &Application) -> anyhow::Result<bool>;
    /// Deletes per [`Application::DELETE_POLICY`]. Returns false when absent.
    async fn delete_application(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;
    async fn group_applications(&self, user_id: &str, query: &GroupCount) -> anyhow::Result<Vec<Bucket>>;
    /// Mean of `lastUpdated - dateApplied` in milliseconds over matching records.
    async fn mean_response_millis(
        &self,
        user_id: &str,
        filter: &ApplicationFilter,
    ) -> anyhow::Result<Option<f64>>;
    async fn latest_application_update(&self, user_id: &str) -> anyhow::Result<Option<OffsetDateTime>>;
}

impl Application {
    pub const DELETE_POLICY: DeletePolicy = DeletePolicy::Hard;
}

const APPLICATION_COLUMNS: &str = "user_id, id, url, site, company_name, job_title, resume_id, \
     resume_name, resume_filename, status, tags, date_applied, date_created, last_updated, notes, \
     status_history, salary, location, application_source";

/// Appends `WHERE user_id = .. AND <filter>` to `qb`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: &str, f: &ApplicationFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id.to_string());

    if !f.statuses.is_empty() {
        let statuses: Vec<String> = f.statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if !f.tags_any.is_empty() {
        qb.push(" AND tags && ").push_bind(f.tags_any.clone());
    }
    if let Some(text) = &f.text {
        let pattern = like_pattern(&text.needle);
        qb.push(" AND (company_name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR job_title ILIKE ").push_bind(pattern.clone());
        if text.scope == TextScope::Everything {
            qb.push(" OR resume_name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR notes ILIKE ").push_bind(pattern.clone());
            qb.push(" OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(")");
    }
    if let Some(company) = &f.company {
        qb.push(" AND company_name ILIKE ").push_bind(like_pattern(company));
    }
    if let Some(from) = f.applied_from {
        qb.push(" AND date_applied >= ").push_bind(from);
    }
    if let Some(to) = f.applied_to {
        qb.push(" AND date_applied <= ").push_bind(to);
    }
    if let Some(since) = f.changed_since {
        qb.push(" AND (last_updated > ").push_bind(since);
        qb.push(" OR date_created > ").push_bind(since).push(")");
    }
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn find_application(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find application")?;
        row.map(Application::try_from).transpose()
    }

    async fn list_applications(
        &self,
        user_id: &str,
        query: &ApplicationQuery,
    ) -> anyhow::Result<Vec<Application>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {APPLICATION_COLUMNS} FROM applications"));
        push_filter(&mut qb, user_id, &query.filter);
        qb.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort.column(),
            query.order.keyword(),
            query.order.keyword()
        ));
        qb.push(" LIMIT ").push_bind(query.limit);
        qb.push(" OFFSET ").push_bind(query.offset);

        let rows = qb
            .build_query_as::<ApplicationRow>()
            .fetch_all(&self.pool)
            .await
            .context("list applications")?;
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn count_applications(&self, user_id: &str, filter: &ApplicationFilter) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM applications");
        push_filter(&mut qb, user_id, filter);
        let n: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("count applications")?;
        Ok(n)
    }

    async fn insert_application(&self, app: &Application) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO applications ({APPLICATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        ))
        .bind(&app.user_id)
        .bind(&app.id)
        .bind(&app.url)
        .bind(&app.site)
        .bind(&app.company_name)
        .bind(&app.job_title)
        .bind(&app.resume_id)
        .bind(&app.resume_name)
        .bind(&app.resume_filename)
        .bind(app.status.as_str())
        .bind(&app.tags)
        .bind(app.date_applied)
        .bind(app.date_created)
        .bind(app.last_updated)
        .bind(&app.notes)
        .bind(Json(&app.status_history))
        .bind(app.salary.as_ref().map(Json))
        .bind(app.location.as_ref().map(Json))
        .bind(app.application_source.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert application {}", app.id))?;
        Ok(())
    }

    async fn replace_application(&self, app: &Application) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE applications
               SET url = $3, site = $4, company_name = $5, job_title = $6, resume_id = $7,
                   resume_name = $8, resume_filename = $9, status = $10, tags = $11,
                   date_applied = $12, last_updated = $13, notes = $14, status_history = $15,
                   salary = $16, location = $17, application_source = $18
             WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(&app.user_id)
        .bind(&app.id)
        .bind(&app.url)
        .bind(&app.site)
        .bind(&app.company_name)
        .bind(&app.job_title)
        .bind(&app.resume_id)
        .bind(&app.resume_name)
        .bind(&app.resume_filename)
        .bind(app.status.as_str())
        .bind(&app.tags)
        .bind(app.date_applied)
        .bind(app.last_updated)
        .bind(&app.notes)
        .bind(Json(&app.status_history))
        .bind(app.salary.as_ref().map(Json))
        .bind(app.location.as_ref().map(Json))
        .bind(app.application_source.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("replace application {}", app.id))?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_application(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        let sql = match Application::DELETE_POLICY {
            DeletePolicy::Hard => "DELETE FROM applications WHERE user_id = $1 AND id = $2",
            DeletePolicy::Soft => anyhow::bail!("applications do not carry an active flag"),
        };
        let res = sqlx::query(sql)
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete application")?;
        Ok(res.rows_affected() > 0)
    }

    async fn group_applications(&self, user_id: &str, query: &GroupCount) -> anyhow::Result<Vec<Bucket>> {
        let select = match query.key {
            GroupKey::Status => "SELECT status AS k, 0 AS y, 0 AS m, COUNT(*) AS n FROM applications",
            GroupKey::Company => "SELECT company_name AS k, 0 AS y, 0 AS m, COUNT(*) AS n FROM applications",
            GroupKey::YearMonth => {
                "SELECT '' AS k, \
                 EXTRACT(YEAR FROM date_applied AT TIME ZONE 'UTC')::int4 AS y, \
                 EXTRACT(MONTH FROM date_applied AT TIME ZONE 'UTC')::int4 AS m, \
                 COUNT(*) AS n FROM applications"
            }
        };
        let mut qb = QueryBuilder::<Postgres>::new(select);
        push_filter(&mut qb, user_id, &query.filter);
        qb.push(match query.key {
            GroupKey::Status | GroupKey::Company => " GROUP BY k",
            GroupKey::YearMonth => " GROUP BY y, m",
        });
        qb.push(match (query.order, query.key) {
            (GroupOrder::Unordered, _) => "",
            (GroupOrder::KeyDesc, GroupKey::YearMonth) => " ORDER BY y DESC, m DESC",
            (GroupOrder::KeyDesc, _) => " ORDER BY k DESC",
            (GroupOrder::CountDesc, GroupKey::YearMonth) => " ORDER BY n DESC, y ASC, m ASC",
            (GroupOrder::CountDesc, _) => " ORDER BY n DESC, k ASC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<(String, i32, i32, i64)> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("group applications")?;

        rows.into_iter()
            .map(|(k, y, m, n)| {
                let key = match query.key {
                    GroupKey::Status => GroupValue::Status(k.parse()?),
                    GroupKey::Company => GroupValue::Company(k),
                    GroupKey::YearMonth => GroupValue::YearMonth {
                        year: y,
                        month: u8::try_from(m).context("month out of range")?,
                    },
                };
                Ok(Bucket { key, count: n })
            })
            .collect()
    }

    async fn mean_response_millis(
        &self,
        user_id: &str,
        filter: &ApplicationFilter,
    ) -> anyhow::Result<Option<f64>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT (AVG(EXTRACT(EPOCH FROM (last_updated - date_applied))) * 1000)::float8 FROM applications",
        );
        push_filter(&mut qb, user_id, filter);
        let mean: Option<f64> = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("mean response time")?;
        Ok(mean)
    }

    async fn latest_application_update(&self, user_id: &str) -> anyhow::Result<Option<OffsetDateTime>> {
        let latest: Option<OffsetDateTime> =
            sqlx::query_scalar("SELECT MAX(last_updated) FROM applications WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .context("latest application update")?;
        Ok(latest)
    }
}
