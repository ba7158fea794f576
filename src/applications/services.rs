use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::warn;

use super::dto::{
    ApplicationPayload, BatchAction, BatchError, BatchResponse, BatchResult, CreateApplicationRequest,
};
use super::repo::ApplicationStore;
use super::repo_types::{
    new_application_id, normalize_tags, Application, ApplicationSource, Salary, StatusEntry,
};
use crate::error::{AppError, AppResult};

/// Creation and modification times for a record that does not exist yet.
#[derive(Debug, Clone, Copy)]
pub struct Stamps {
    pub date_created: OffsetDateTime,
    pub last_updated: OffsetDateTime,
}

impl Stamps {
    pub fn at(now: OffsetDateTime) -> Self {
        Self {
            date_created: now,
            last_updated: now,
        }
    }
}

fn check_salary(salary: Option<&Salary>) -> AppResult<()> {
    match salary.and_then(|s| s.amount) {
        Some(amount) if amount <= 0.0 => Err(AppError::Validation {
            message: "Invalid input data".into(),
            details: Some(json!({ "salary.amount": "must be positive" })),
        }),
        _ => Ok(()),
    }
}

impl ApplicationPayload {
    /// Builds a fresh record owned by `user_id`. `dateCreated` never lands
    /// after `lastUpdated`.
    pub fn into_new(
        self,
        user_id: &str,
        id: String,
        stamps: Stamps,
        default_source: ApplicationSource,
    ) -> Application {
        let last_updated = stamps.last_updated;
        let date_created = stamps.date_created.min(last_updated);
        let date_applied = self.date_applied.unwrap_or(date_created);
        let history = self.status_history.filter(|h| !h.is_empty());
        let status = self
            .status
            .or_else(|| history.as_ref().and_then(|h| h.last()).map(|e| e.status))
            .unwrap_or_default();
        let status_history = match history {
            Some(history) => history,
            None => vec![StatusEntry {
                status,
                date: date_applied,
                notes: self.status_notes,
            }],
        };
        Application {
            user_id: user_id.to_string(),
            id,
            url: self.url.unwrap_or_default(),
            site: self.site.unwrap_or_default(),
            company_name: self.company_name.unwrap_or_default(),
            job_title: self.job_title.unwrap_or_default(),
            resume_id: self.resume_id,
            resume_name: self.resume_name,
            resume_filename: self.resume_filename,
            status,
            tags: normalize_tags(self.tags.unwrap_or_default()),
            date_applied,
            date_created,
            last_updated,
            notes: self.notes,
            status_history,
            salary: self.salary,
            location: self.location,
            application_source: self.application_source.unwrap_or(default_source),
        }
    }

    /// Overwrites every provided field of `app` and stamps it with `at`.
    /// Identity, owner and `dateCreated` are never taken from the payload.
    pub fn apply_to(self, app: &mut Application, at: OffsetDateTime) {
        if let Some(v) = self.url {
            app.url = v;
        }
        if let Some(v) = self.site {
            app.site = v;
        }
        if let Some(v) = self.company_name {
            app.company_name = v;
        }
        if let Some(v) = self.job_title {
            app.job_title = v;
        }
        if let Some(v) = self.resume_id {
            app.resume_id = Some(v);
        }
        if let Some(v) = self.resume_name {
            app.resume_name = Some(v);
        }
        if let Some(v) = self.resume_filename {
            app.resume_filename = Some(v);
        }
        if let Some(v) = self.tags {
            app.tags = normalize_tags(v);
        }
        if let Some(v) = self.date_applied {
            app.date_applied = v;
        }
        if let Some(v) = self.notes {
            app.notes = Some(v);
        }
        if let Some(v) = self.salary {
            app.salary = Some(v);
        }
        if let Some(v) = self.location {
            app.location = Some(v);
        }
        if let Some(v) = self.application_source {
            app.application_source = v;
        }
        if let Some(history) = self.status_history {
            app.adopt_history(history);
        }
        if let Some(status) = self.status {
            app.transition(status, at, self.status_notes);
        }
        app.touch(at);
    }
}

/// `POST /applications`: validated manual entry.
pub fn new_manual(user_id: &str, req: CreateApplicationRequest, now: OffsetDateTime) -> AppResult<Application> {
    check_salary(req.salary.as_ref())?;
    let payload = ApplicationPayload {
        url: Some(req.url),
        site: Some(req.site),
        company_name: Some(req.company_name),
        job_title: Some(req.job_title),
        resume_id: req.resume_id,
        resume_name: req.resume_name,
        resume_filename: req.resume_filename,
        status: req.status,
        tags: req.tags,
        date_applied: req.date_applied,
        status_notes: req.notes.clone(),
        notes: req.notes,
        salary: req.salary,
        location: req.location,
        ..ApplicationPayload::default()
    };
    Ok(payload.into_new(user_id, new_application_id(), Stamps::at(now), ApplicationSource::Manual))
}

/// Applies an edit to a stored application. `None` when it does not exist.
pub async fn update<S: ApplicationStore + ?Sized>(
    store: &S,
    user_id: &str,
    id: &str,
    payload: ApplicationPayload,
    now: OffsetDateTime,
) -> AppResult<Option<Application>> {
    check_salary(payload.salary.as_ref())?;
    let Some(mut app) = store.find_application(user_id, id).await? else {
        return Ok(None);
    };
    payload.apply_to(&mut app, now);
    if !store.replace_application(&app).await? {
        return Ok(None);
    }
    Ok(Some(app))
}

async fn upsert_one<S: ApplicationStore + ?Sized>(
    store: &S,
    user_id: &str,
    item: Value,
    now: OffsetDateTime,
) -> anyhow::Result<BatchResult> {
    let payload: ApplicationPayload = serde_json::from_value(item)?;
    if payload.salary.as_ref().and_then(|s| s.amount).is_some_and(|a| a <= 0.0) {
        anyhow::bail!("salary amount must be positive");
    }

    if let Some(id) = payload.id.clone() {
        if let Some(mut app) = store.find_application(user_id, &id).await? {
            payload.apply_to(&mut app, now);
            store.replace_application(&app).await?;
            return Ok(BatchResult {
                action: BatchAction::Updated,
                application: app,
            });
        }
    }

    let id = payload.id.clone().unwrap_or_else(new_application_id);
    let app = payload.into_new(user_id, id, Stamps::at(now), ApplicationSource::Import);
    store.insert_application(&app).await?;
    Ok(BatchResult {
        action: BatchAction::Created,
        application: app,
    })
}

/// Upserts every item independently; one bad item never aborts the rest.
pub async fn batch_upsert<S: ApplicationStore + ?Sized>(
    store: &S,
    user_id: &str,
    items: Value,
    now: OffsetDateTime,
) -> AppResult<BatchResponse> {
    let Value::Array(items) = items else {
        return Err(AppError::validation("Applications must be an array"));
    };

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match upsert_one(store, user_id, item, now).await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(error = %e, index, "batch item failed");
                errors.push(BatchError {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(BatchResponse {
        success: results.len(),
        error_count: errors.len(),
        results,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::repo_types::ApplicationStatus;
    use crate::memory::MemoryStore;
    use crate::testing::{application, USER};
    use time::macros::datetime;

    fn create_req() -> CreateApplicationRequest {
        serde_json::from_value(json!({
            "url": "https://jobs.example.com/42",
            "site": "example",
            "companyName": "Acme",
            "jobTitle": "Engineer",
            "status": "Interview",
            "tags": ["remote", "remote", "rust"],
            "dateApplied": "2024-03-01T00:00:00Z",
            "notes": "referral"
        }))
        .unwrap()
    }

    #[test]
    fn manual_create_seeds_history_and_source() {
        let now = datetime!(2024-03-02 00:00 UTC);
        let app = new_manual(USER, create_req(), now).unwrap();
        assert!(app.id.starts_with("app_"));
        assert_eq!(app.application_source, ApplicationSource::Manual);
        assert_eq!(app.tags, vec!["remote", "rust"]);
        assert_eq!(app.date_created, now);
        assert_eq!(app.status_history.len(), 1);
        assert_eq!(app.status_history[0].status, ApplicationStatus::Interview);
        assert_eq!(app.status_history[0].date, datetime!(2024-03-01 00:00 UTC));
        assert_eq!(app.status_history[0].notes.as_deref(), Some("referral"));
    }

    #[test]
    fn non_positive_salary_is_rejected() {
        let mut req = create_req();
        req.salary = Some(Salary {
            amount: Some(0.0),
            currency: None,
            period: None,
        });
        let err = new_manual(USER, req, OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn new_record_never_created_after_last_update() {
        let payload = ApplicationPayload {
            date_created: Some(datetime!(2024-02-01 00:00 UTC)),
            ..Default::default()
        };
        let stamps = Stamps {
            date_created: datetime!(2024-02-01 00:00 UTC),
            last_updated: datetime!(2024-01-01 00:00 UTC),
        };
        let app = payload.into_new(USER, "app_1".into(), stamps, ApplicationSource::Extension);
        assert_eq!(app.date_created, app.last_updated);
        assert_eq!(app.status, ApplicationStatus::Applied);
        assert_eq!(app.status_history.len(), 1);
    }

    #[test]
    fn status_defaults_to_end_of_supplied_history() {
        let day = |d| datetime!(2024-01-01 00:00 UTC) + time::Duration::days(d);
        let history = vec![
            StatusEntry { status: ApplicationStatus::Applied, date: day(0), notes: None },
            StatusEntry { status: ApplicationStatus::Offer, date: day(5), notes: None },
        ];
        let payload = ApplicationPayload {
            status_history: Some(history.clone()),
            ..Default::default()
        };
        let app = payload.into_new(USER, "app_1".into(), Stamps::at(day(6)), ApplicationSource::Extension);
        assert_eq!(app.status, ApplicationStatus::Offer);
        assert_eq!(app.status_history, history);

        let empty = ApplicationPayload {
            status_history: Some(vec![]),
            ..Default::default()
        };
        let app = empty.into_new(USER, "app_2".into(), Stamps::at(day(6)), ApplicationSource::Extension);
        assert_eq!(app.status, ApplicationStatus::Applied);
        assert_eq!(app.status_history.len(), 1);
    }

    #[test]
    fn apply_keeps_identity_and_appends_history() {
        let mut app = application("app_1");
        let at = datetime!(2024-02-01 00:00 UTC);
        ApplicationPayload {
            id: Some("app_other".into()),
            date_created: Some(datetime!(2030-01-01 00:00 UTC)),
            status: Some(ApplicationStatus::Offer),
            status_notes: Some("verbal".into()),
            company_name: Some("Globex".into()),
            ..Default::default()
        }
        .apply_to(&mut app, at);

        assert_eq!(app.id, "app_1");
        assert_eq!(app.date_created, datetime!(2024-01-01 00:00 UTC));
        assert_eq!(app.company_name, "Globex");
        assert_eq!(app.last_updated, at);
        assert_eq!(app.status_history.len(), 2);
        assert_eq!(app.status_history[1].notes.as_deref(), Some("verbal"));
    }

    #[tokio::test]
    async fn update_missing_application_is_none() {
        let store = MemoryStore::new();
        let res = update(&store, USER, "app_nope", ApplicationPayload::default(), OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn batch_collects_per_item_errors() {
        let store = MemoryStore::new();
        store.insert_application(&application("app_1")).await.unwrap();
        let items = json!([
            {"id": "app_1", "status": "Rejected"},
            {"companyName": "Initech", "jobTitle": "Dev"},
            {"id": "app_bad", "status": "Ghosted"},
        ]);

        let res = batch_upsert(&store, USER, items, OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(res.success, 2);
        assert_eq!(res.error_count, 1);
        assert_eq!(res.errors[0].index, 2);
        assert_eq!(res.results[0].action, BatchAction::Updated);
        assert_eq!(res.results[0].application.status, ApplicationStatus::Rejected);
        assert_eq!(res.results[1].action, BatchAction::Created);
        assert_eq!(res.results[1].application.application_source, ApplicationSource::Import);
    }

    #[tokio::test]
    async fn batch_requires_an_array() {
        let store = MemoryStore::new();
        let err = batch_upsert(&store, USER, json!({"id": "x"}), OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Applications must be an array");
    }
}
