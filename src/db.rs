use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::applications::repo::ApplicationStore;
use crate::auth::repo::UserStore;
use crate::config::AppConfig;
use crate::resumes::repo::ResumeStore;

/// Everything handlers need from persistence.
pub trait Store: UserStore + ApplicationStore + ResumeStore {}

impl<T: UserStore + ApplicationStore + ResumeStore> Store for T {}

/// How an entity leaves the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Row is removed.
    Hard,
    /// Row stays, `is_active` flips to false and reads filter it out.
    Soft,
}

#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    /// Builds the process-wide pool; connections open on first use.
    pub fn connect_lazy(config: &AppConfig, url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect_lazy(url)
            .context("configure database pool")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

/// `%needle%` for ILIKE with the wildcard characters of `needle` escaped.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
