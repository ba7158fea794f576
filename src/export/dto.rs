use serde::Serialize;
use time::OffsetDateTime;

use crate::applications::repo_types::Application;
use crate::auth::repo_types::{Preferences, User};
use crate::resumes::repo_types::Resume;

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupUser {
    pub user_id: String,
    pub email: Option<String>,
    pub preferences: Preferences,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for BackupUser {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            preferences: u.preferences,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
    pub total_applications: usize,
    pub total_resumes: usize,
}

/// Full account backup. Resumes never carry their PDF payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub export_date: OffsetDateTime,
    pub user: BackupUser,
    pub applications: Vec<Application>,
    pub resumes: Vec<Resume>,
    pub stats: BackupStats,
}
