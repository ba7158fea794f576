//! Push/pull reconciliation between the extension's local store and the server.
//!
//! Conflicts are decided per record by a single timestamp comparison: the
//! client loses only when the stored timestamp is strictly newer than the one
//! embedded in its payload. Nothing is merged field by field.

use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, warn};

use super::dto::{
    Conflict, ConflictKind, Counts, EntityResult, PullData, PullResponse, PushRequest, PushResponse,
    PushResults, SyncStatus,
};
use crate::applications::{
    dto::ApplicationPayload,
    query::{ApplicationFilter, ApplicationQuery, SortField, SortOrder},
    repo::ApplicationStore,
    repo_types::{Application, ApplicationSource},
    services::Stamps,
};
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::resumes::{dto::ResumePayload, repo::ResumeStore, repo_types::Resume};

/// What happened to one pushed record.
#[derive(Debug)]
pub enum Outcome<T> {
    Created,
    Updated,
    Conflict(Conflict<T>),
}

impl<T> EntityResult<T> {
    fn record(&mut self, outcome: Outcome<T>) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Conflict(c) => self.conflicts.push(c),
        }
    }
}

/// Last-write-wins: the stored version survives only when strictly newer.
/// A client record without a timestamp always wins.
pub fn server_wins(server: OffsetDateTime, client: Option<OffsetDateTime>) -> bool {
    client.is_some_and(|client| server > client)
}

pub fn parse_since(raw: Option<&str>) -> AppResult<Option<OffsetDateTime>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => OffsetDateTime::parse(s, &Rfc3339)
            .map(Some)
            .map_err(|_| AppError::validation("Invalid lastSync timestamp")),
    }
}

fn record_id(id: Option<&String>) -> anyhow::Result<String> {
    id.filter(|id| !id.trim().is_empty())
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("record has no id"))
}

pub async fn push_application<S: ApplicationStore + ?Sized>(
    store: &S,
    user_id: &str,
    raw: Value,
    sync_ts: OffsetDateTime,
) -> anyhow::Result<Outcome<Application>> {
    let payload: ApplicationPayload = serde_json::from_value(raw.clone())?;
    let id = record_id(payload.id.as_ref())?;

    match store.find_application(user_id, &id).await? {
        Some(existing) if server_wins(existing.last_updated, payload.last_updated) => {
            debug!(user_id = %user_id, id = %id, "server copy is newer");
            Ok(Outcome::Conflict(Conflict {
                id,
                kind: ConflictKind::ServerNewer,
                server_data: existing,
                client_data: raw,
            }))
        }
        Some(mut existing) => {
            payload.apply_to(&mut existing, sync_ts);
            store.replace_application(&existing).await?;
            Ok(Outcome::Updated)
        }
        None => {
            // stamped at sync time so pulls since any earlier sync see it
            let stamps = Stamps {
                date_created: payload.date_created.unwrap_or(sync_ts),
                last_updated: sync_ts,
            };
            let app = payload.into_new(user_id, id, stamps, ApplicationSource::Extension);
            store.insert_application(&app).await?;
            Ok(Outcome::Created)
        }
    }
}

pub async fn push_resume<S: ResumeStore + ?Sized>(
    store: &S,
    user_id: &str,
    raw: Value,
    sync_ts: OffsetDateTime,
) -> anyhow::Result<Outcome<Resume>> {
    let payload: ResumePayload = serde_json::from_value(raw.clone())?;
    let id = record_id(payload.id.as_ref())?;

    match store.find_resume(user_id, &id).await? {
        Some(existing) if server_wins(existing.last_modified, payload.last_modified) => {
            debug!(user_id = %user_id, id = %id, "server copy is newer");
            Ok(Outcome::Conflict(Conflict {
                id,
                kind: ConflictKind::ServerNewer,
                server_data: existing.without_pdf(),
                client_data: raw,
            }))
        }
        Some(mut existing) => {
            payload.apply_to(&mut existing, sync_ts)?;
            store.replace_resume(&existing).await?;
            Ok(Outcome::Updated)
        }
        None => {
            let resume = payload.into_new(user_id, id, sync_ts)?;
            store.insert_resume(&resume).await?;
            Ok(Outcome::Created)
        }
    }
}

fn records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Reconciles a pushed batch. Records are processed in order; a failing
/// record is logged and skipped without touching the rest.
pub async fn push<S: Store + ?Sized>(
    store: &S,
    user_id: &str,
    req: PushRequest,
    sync_ts: OffsetDateTime,
) -> PushResponse {
    let mut results = PushResults::default();

    for raw in records(req.applications) {
        let id = raw.get("id").cloned().unwrap_or(Value::Null);
        match push_application(store, user_id, raw, sync_ts).await {
            Ok(outcome) => results.applications.record(outcome),
            Err(e) => warn!(error = %e, user_id = %user_id, id = %id, "skipping application record"),
        }
    }

    for raw in records(req.resumes) {
        let id = raw.get("id").cloned().unwrap_or(Value::Null);
        match push_resume(store, user_id, raw, sync_ts).await {
            Ok(outcome) => results.resumes.record(outcome),
            Err(e) => warn!(error = %e, user_id = %user_id, id = %id, "skipping resume record"),
        }
    }

    PushResponse {
        success: true,
        sync_timestamp: sync_ts,
        results,
    }
}

/// Everything changed after `since`, or the full data set without it.
/// `now` is taken before reading so a write racing the pull is picked up by
/// the next one.
pub async fn pull<S: Store + ?Sized>(
    store: &S,
    user_id: &str,
    since: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> AppResult<PullResponse> {
    let query = ApplicationQuery {
        sort: SortField::LastUpdated,
        order: SortOrder::Desc,
        ..ApplicationQuery::all(ApplicationFilter::changed_since(since))
    };
    let (applications, resumes) = tokio::try_join!(
        store.list_applications(user_id, &query),
        store.list_active_resumes(user_id, since),
    )?;
    let has_changes = !applications.is_empty() || !resumes.is_empty();
    Ok(PullResponse {
        success: true,
        sync_timestamp: now,
        data: PullData {
            applications,
            resumes,
        },
        has_changes,
    })
}

pub async fn status<S: Store + ?Sized>(store: &S, user_id: &str, now: OffsetDateTime) -> AppResult<SyncStatus> {
    let filter = ApplicationFilter::default();
    let (user, applications, resumes, last_app, last_resume) = tokio::try_join!(
        store.find_user(user_id),
        store.count_applications(user_id, &filter),
        store.count_active_resumes(user_id),
        store.latest_application_update(user_id),
        store.latest_resume_update(user_id),
    )?;
    Ok(SyncStatus {
        user_id: user_id.to_string(),
        last_active: user.map(|u| u.last_active),
        last_data_update: last_app.max(last_resume),
        counts: Counts {
            applications,
            resumes,
        },
        server_time: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::repo_types::ApplicationStatus;
    use crate::memory::MemoryStore;
    use crate::testing::{application, resume, USER};
    use serde_json::json;
    use time::macros::datetime;

    fn push_apps(apps: Value) -> PushRequest {
        PushRequest {
            applications: apps,
            ..PushRequest::default()
        }
    }

    #[test]
    fn equal_timestamps_accept_the_client() {
        let t = datetime!(2024-01-01 00:00 UTC);
        assert!(!server_wins(t, Some(t)));
        assert!(server_wins(t, Some(t - time::Duration::SECOND)));
        assert!(!server_wins(t, None));
    }

    #[test]
    fn since_must_be_rfc3339() {
        assert_eq!(parse_since(None).unwrap(), None);
        assert_eq!(parse_since(Some("")).unwrap(), None);
        assert_eq!(
            parse_since(Some("2024-01-01T00:00:00Z")).unwrap(),
            Some(datetime!(2024-01-01 00:00 UTC))
        );
        assert!(parse_since(Some("yesterday")).is_err());
    }

    #[tokio::test]
    async fn create_update_then_conflict() {
        let store = MemoryStore::new();
        let created_at = datetime!(2024-03-01 00:00 UTC);
        let ts = datetime!(2024-03-02 00:00 UTC);

        let first = json!([{"id": "app_1", "status": "Applied", "lastUpdated": "2024-01-01T00:00:00Z"}]);
        let res = push(&store, USER, push_apps(first), created_at).await;
        assert_eq!(res.results.applications.created, 1);
        assert!(res.results.applications.conflicts.is_empty());

        // the client saw the created record, so it carries the server stamp back
        let second = json!([{"id": "app_1", "status": "Interview", "lastUpdated": "2024-03-01T00:00:00Z"}]);
        let res = push(&store, USER, push_apps(second), ts).await;
        assert_eq!(res.results.applications.updated, 1);
        assert!(res.results.applications.conflicts.is_empty());

        let third = json!([{"id": "app_1", "status": "Rejected", "lastUpdated": "2024-03-01T12:00:00Z"}]);
        let res = push(&store, USER, push_apps(third), ts).await;
        assert_eq!(res.results.applications.updated, 0);
        let conflicts = &res.results.applications.conflicts;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ServerNewer);
        assert_eq!(conflicts[0].server_data.status, ApplicationStatus::Interview);
        assert_eq!(conflicts[0].client_data["status"], "Rejected");

        let stored = store.find_application(USER, "app_1").await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Interview);
        assert_eq!(stored.last_updated, ts);
        let statuses: Vec<_> = stored.status_history.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![ApplicationStatus::Applied, ApplicationStatus::Interview]);
    }

    #[tokio::test]
    async fn record_created_offline_reaches_devices_that_pulled_earlier() {
        let store = MemoryStore::new();
        let last_pull = datetime!(2024-06-01 00:00 UTC);
        let first = pull(&store, USER, None, last_pull).await.unwrap();
        assert!(!first.has_changes);

        let sync_ts = datetime!(2024-06-02 00:00 UTC);
        let req = PushRequest {
            applications: json!([{
                "id": "app_offline",
                "companyName": "Acme",
                "dateCreated": "2024-01-09T00:00:00Z",
                "lastUpdated": "2024-01-10T00:00:00Z"
            }]),
            resumes: json!([{
                "id": "resume_offline",
                "filename": "cv.pdf",
                "dateAdded": "2024-01-09T00:00:00Z",
                "lastModified": "2024-01-10T00:00:00Z"
            }]),
            ..PushRequest::default()
        };
        let res = push(&store, USER, req, sync_ts).await;
        assert_eq!(res.results.applications.created, 1);
        assert_eq!(res.results.resumes.created, 1);

        let next = pull(&store, USER, Some(last_pull), datetime!(2024-06-03 00:00 UTC)).await.unwrap();
        assert_eq!(next.data.applications.len(), 1);
        assert_eq!(next.data.resumes.len(), 1);

        let app = &next.data.applications[0];
        assert_eq!(app.last_updated, sync_ts);
        assert_eq!(app.date_created, datetime!(2024-01-09 00:00 UTC));
        assert_eq!(app.application_source, ApplicationSource::Extension);
        assert_eq!(app.status_history.len(), 1);
        let resume = &next.data.resumes[0];
        assert_eq!(resume.last_modified, sync_ts);
        assert_eq!(resume.date_added, datetime!(2024-01-09 00:00 UTC));
    }

    #[tokio::test]
    async fn created_record_never_starts_after_the_sync() {
        let store = MemoryStore::new();
        let sync_ts = datetime!(2024-03-01 00:00 UTC);
        let apps = json!([{"id": "app_9", "dateCreated": "2024-09-01T00:00:00Z"}]);
        push(&store, USER, push_apps(apps), sync_ts).await;

        let stored = store.find_application(USER, "app_9").await.unwrap().unwrap();
        assert_eq!(stored.last_updated, sync_ts);
        assert_eq!(stored.date_created, sync_ts);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_not_fatal() {
        let store = MemoryStore::new();
        let apps = json!([
            {"id": "app_1", "status": "Ghosted"},
            {"status": "Applied"},
            "not an object",
            {"id": "app_2"},
        ]);
        let res = push(&store, USER, push_apps(apps), OffsetDateTime::now_utc()).await;
        assert!(res.success);
        assert_eq!(res.results.applications.created, 1);
        assert!(store.find_application(USER, "app_2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn conflicting_push_never_mutates_the_stored_record() {
        let store = MemoryStore::new();
        let mut stored = application("app_1");
        stored.last_updated = datetime!(2024-06-01 00:00 UTC);
        store.insert_application(&stored).await.unwrap();

        let apps = json!([{"id": "app_1", "companyName": "Changed", "lastUpdated": "2024-05-01T00:00:00Z"}]);
        let res = push(&store, USER, push_apps(apps), OffsetDateTime::now_utc()).await;
        assert_eq!(res.results.applications.conflicts.len(), 1);
        assert_eq!(store.find_application(USER, "app_1").await.unwrap().unwrap(), stored);
    }

    #[tokio::test]
    async fn resume_push_validates_pdf_and_detects_conflicts() {
        let store = MemoryStore::new();
        let mut stored = resume("resume_1");
        stored.last_modified = datetime!(2024-06-01 00:00 UTC);
        store.insert_resume(&stored).await.unwrap();

        let req = PushRequest {
            resumes: json!([
                {"id": "resume_1", "name": "old", "lastModified": "2024-01-01T00:00:00Z"},
                {"id": "resume_2", "filename": "new.pdf", "pdfData": "JVBERi0xLjQ="},
                {"id": "resume_3", "pdfData": "%%%"},
            ]),
            ..PushRequest::default()
        };
        let res = push(&store, USER, req, OffsetDateTime::now_utc()).await;
        assert_eq!(res.results.resumes.created, 1);
        assert_eq!(res.results.resumes.conflicts.len(), 1);
        assert!(res.results.resumes.conflicts[0].server_data.pdf_data.is_none());

        let created = store.find_resume(USER, "resume_2").await.unwrap().unwrap();
        assert_eq!(created.name, "new");
        assert_eq!(created.file_size, 8);
        assert!(store.find_resume(USER, "resume_3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pull_returns_only_changes_after_since() {
        let store = MemoryStore::new();
        let mut old = application("app_old");
        old.last_updated = datetime!(2024-01-01 00:00 UTC);
        let mut new = application("app_new");
        new.last_updated = datetime!(2024-02-01 00:00 UTC);
        store.insert_application(&old).await.unwrap();
        store.insert_application(&new).await.unwrap();
        store.insert_resume(&resume("resume_1")).await.unwrap();

        let now = datetime!(2024-03-01 00:00 UTC);
        let res = pull(&store, USER, Some(datetime!(2024-01-15 00:00 UTC)), now).await.unwrap();
        let ids: Vec<_> = res.data.applications.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["app_new"]);
        assert!(res.data.resumes.is_empty());
        assert!(res.has_changes);
        assert_eq!(res.sync_timestamp, now);

        let full = pull(&store, USER, None, now).await.unwrap();
        assert_eq!(full.data.applications.len(), 2);
        assert_eq!(full.data.resumes.len(), 1);
        assert!(full.data.resumes[0].pdf_data.is_none());
    }

    #[tokio::test]
    async fn pushed_record_round_trips_through_pull() {
        let store = MemoryStore::new();
        let pushed = json!([{
            "id": "app_rt",
            "companyName": "Acme",
            "jobTitle": "SRE",
            "status": "Offer",
            "tags": ["remote"],
            "notes": "good team",
        }]);
        push(&store, USER, push_apps(pushed), OffsetDateTime::now_utc()).await;
        let res = pull(&store, USER, None, OffsetDateTime::now_utc()).await.unwrap();
        let app = &res.data.applications[0];
        assert_eq!(app.company_name, "Acme");
        assert_eq!(app.job_title, "SRE");
        assert_eq!(app.status, ApplicationStatus::Offer);
        assert_eq!(app.tags, vec!["remote"]);
        assert_eq!(app.notes.as_deref(), Some("good team"));
    }

    #[tokio::test]
    async fn status_reports_counts_and_latest_change() {
        let store = MemoryStore::new();
        let mut a = application("app_1");
        a.last_updated = datetime!(2024-02-01 00:00 UTC);
        store.insert_application(&a).await.unwrap();
        store.insert_resume(&resume("resume_1")).await.unwrap();

        let now = datetime!(2024-03-01 00:00 UTC);
        let st = status(&store, USER, now).await.unwrap();
        assert_eq!(st.counts.applications, 1);
        assert_eq!(st.counts.resumes, 1);
        assert_eq!(st.last_data_update, Some(datetime!(2024-02-01 00:00 UTC)));
        assert!(st.last_active.is_none());
        assert_eq!(st.server_time, now);
    }
}
