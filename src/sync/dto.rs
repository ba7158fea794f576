use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::applications::repo_types::Application;
use crate::resumes::repo_types::Resume;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullQuery {
    pub last_sync: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PullData {
    pub applications: Vec<Application>,
    pub resumes: Vec<Resume>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub success: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub sync_timestamp: OffsetDateTime,
    pub data: PullData,
    pub has_changes: bool,
}

/// Push body. Non-array collections are ignored rather than rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    #[serde(default)]
    pub applications: Value,
    #[serde(default)]
    pub resumes: Value,
    /// Informational only; reconciliation compares per-record timestamps.
    #[serde(default)]
    pub last_sync_timestamp: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    ServerNewer,
}

/// A rejected client write. The stored record is left untouched.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict<T> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub server_data: T,
    pub client_data: Value,
}

#[derive(Debug, Serialize)]
pub struct EntityResult<T> {
    pub created: usize,
    pub updated: usize,
    pub conflicts: Vec<Conflict<T>>,
}

impl<T> Default for EntityResult<T> {
    fn default() -> Self {
        Self {
            created: 0,
            updated: 0,
            conflicts: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PushResults {
    pub applications: EntityResult<Application>,
    pub resumes: EntityResult<Resume>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub success: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub sync_timestamp: OffsetDateTime,
    pub results: PushResults,
}

#[derive(Debug, Serialize)]
pub struct Counts {
    pub applications: i64,
    pub resumes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_active: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_data_update: Option<OffsetDateTime>,
    pub counts: Counts,
    #[serde(with = "time::serde::rfc3339")]
    pub server_time: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: SyncStatus,
}
