use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use validator::Validate;

use super::query::{SortField, SortOrder};
use super::repo_types::{Application, ApplicationSource, ApplicationStatus, Location, Salary, StatusEntry};

/// Loosely shaped application record as sent by the extension and by batch
/// imports. Absent fields leave stored values alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPayload {
    pub id: Option<String>,
    pub url: Option<String>,
    pub site: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub resume_id: Option<String>,
    pub resume_name: Option<String>,
    pub resume_filename: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub tags: Option<Vec<String>>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_applied: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    pub notes: Option<String>,
    pub status_history: Option<Vec<StatusEntry>>,
    pub salary: Option<Salary>,
    pub location: Option<Location>,
    pub application_source: Option<ApplicationSource>,
    pub status_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    #[validate(url(message = "Invalid url"))]
    pub url: String,
    #[validate(length(min = 1))]
    pub site: String,
    #[validate(length(min = 1))]
    pub company_name: String,
    #[validate(length(min = 1))]
    pub job_title: String,
    pub resume_id: Option<String>,
    pub resume_name: Option<String>,
    pub resume_filename: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub tags: Option<Vec<String>>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_applied: Option<OffsetDateTime>,
    pub notes: Option<String>,
    pub salary: Option<Salary>,
    pub location: Option<Location>,
}

/// Field edits for `PUT /applications/:id`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationRequest {
    pub status: Option<ApplicationStatus>,
    pub status_notes: Option<String>,
    #[validate(length(min = 1))]
    pub company_name: Option<String>,
    #[validate(length(min = 1))]
    pub job_title: Option<String>,
    pub resume_id: Option<String>,
    pub resume_name: Option<String>,
    pub resume_filename: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub salary: Option<Salary>,
    pub location: Option<Location>,
}

impl From<UpdateApplicationRequest> for ApplicationPayload {
    fn from(r: UpdateApplicationRequest) -> Self {
        Self {
            status: r.status,
            status_notes: r.status_notes,
            company_name: r.company_name,
            job_title: r.job_title,
            resume_id: r.resume_id,
            resume_name: r.resume_name,
            resume_filename: r.resume_filename,
            tags: r.tags,
            notes: r.notes,
            salary: r.salary,
            location: r.location,
            ..Self::default()
        }
    }
}

/// `tags=a,b` query parameter.
fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<ApplicationStatus>,
    pub tags: Option<String>,
    pub company: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl ListQuery {
    pub fn tags(&self) -> Vec<String> {
        split_csv(self.tags.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub tags: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date_to: Option<OffsetDateTime>,
    pub company: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl SearchQuery {
    pub fn tags(&self) -> Vec<String> {
        split_csv(self.tags.as_deref())
    }
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationList {
    pub applications: Vec<Application>,
    pub total: i64,
    pub has_more: bool,
}

/// Echo of the interpreted search parameters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEcho {
    pub search_term: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub tags: Option<Vec<String>>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_to: Option<OffsetDateTime>,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(flatten)]
    pub list: ApplicationList,
    pub query: SearchEcho,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub application: Application,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub applications: Value,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Created,
    Updated,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub action: BatchAction,
    pub application: Application,
}

#[derive(Debug, Serialize)]
pub struct BatchError {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: usize,
    pub error_count: usize,
    pub results: Vec<BatchResult>,
    pub errors: Vec<BatchError>,
}
