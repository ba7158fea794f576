use time::{OffsetDateTime, UtcOffset};

use super::dto::{Backup, BackupStats, BackupUser, BACKUP_VERSION};
use crate::applications::{
    query::{ApplicationFilter, ApplicationQuery},
    repo::ApplicationStore,
    repo_types::Application,
};
use crate::auth::repo::UserStore;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::resumes::repo::ResumeStore;

pub const CSV_HEADER: [&str; 15] = [
    "Company Name",
    "Job Title",
    "Status",
    "Date Applied",
    "URL",
    "Site",
    "Resume Name",
    "Tags",
    "Notes",
    "Salary Amount",
    "Salary Currency",
    "Location City",
    "Location State",
    "Location Country",
    "Remote",
];

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Calendar date of `at` in UTC, `YYYY-MM-DD`.
pub fn utc_day(at: OffsetDateTime) -> String {
    at.to_offset(UtcOffset::UTC).date().to_string()
}

fn row(app: &Application) -> String {
    let salary = app.salary.as_ref();
    let location = app.location.as_ref();
    let opt = |v: Option<&String>| v.cloned().unwrap_or_default();

    let cells = [
        app.company_name.clone(),
        app.job_title.clone(),
        app.status.to_string(),
        utc_day(app.date_applied),
        app.url.clone(),
        app.site.clone(),
        opt(app.resume_name.as_ref()),
        app.tags.join("; "),
        opt(app.notes.as_ref()),
        salary
            .and_then(|s| s.amount)
            .map(|a| a.to_string())
            .unwrap_or_default(),
        opt(salary.and_then(|s| s.currency.as_ref())),
        opt(location.and_then(|l| l.city.as_ref())),
        opt(location.and_then(|l| l.state.as_ref())),
        opt(location.and_then(|l| l.country.as_ref())),
        if location.and_then(|l| l.remote).unwrap_or(false) {
            "Yes".into()
        } else {
            "No".into()
        },
    ];
    cells.iter().map(|c| quote(c)).collect::<Vec<_>>().join(",")
}

/// Renders applications as CSV in the order given.
pub fn csv_document(apps: &[Application]) -> String {
    let mut lines = Vec::with_capacity(apps.len() + 1);
    lines.push(CSV_HEADER.join(","));
    lines.extend(apps.iter().map(row));
    lines.join("\n")
}

pub async fn csv<S: Store + ?Sized>(store: &S, user_id: &str) -> AppResult<String> {
    let apps = store
        .list_applications(user_id, &ApplicationQuery::all(ApplicationFilter::default()))
        .await?;
    Ok(csv_document(&apps))
}

pub async fn backup<S: Store + ?Sized>(store: &S, user_id: &str, now: OffsetDateTime) -> AppResult<Backup> {
    let everything = ApplicationQuery::all(ApplicationFilter::default());
    let (user, applications, resumes) = tokio::try_join!(
        store.find_user(user_id),
        store.list_applications(user_id, &everything),
        store.list_active_resumes(user_id, None),
    )?;
    let user = user.ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Backup {
        version: BACKUP_VERSION,
        export_date: now,
        user: BackupUser::from(user),
        stats: BackupStats {
            total_applications: applications.len(),
            total_resumes: resumes.len(),
        },
        applications,
        resumes,
    })
}
