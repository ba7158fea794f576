use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::applications::repo_types::ApplicationStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub auto_detect: bool,
    pub default_status: ApplicationStatus,
    pub email_notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_detect: true,
            default_status: ApplicationStatus::Applied,
            email_notifications: false,
        }
    }
}

/// Account record. Anonymous accounts carry neither email nor password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,        // Argon2 hash, not exposed in JSON
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
    pub preferences: Preferences,
}

pub fn new_user_id() -> String {
    format!("user_{}", uuid::Uuid::new_v4().simple())
}

/// Partial preferences update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub auto_detect: Option<bool>,
    pub default_status: Option<ApplicationStatus>,
    pub email_notifications: Option<bool>,
}

impl PreferencesPatch {
    pub fn apply(&self, prefs: &mut Preferences) {
        if let Some(v) = self.auto_detect {
            prefs.auto_detect = v;
        }
        if let Some(v) = self.default_status {
            prefs.default_status = v;
        }
        if let Some(v) = self.email_notifications {
            prefs.email_notifications = v;
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub user_id: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_active: OffsetDateTime,
    pub auto_detect: bool,
    pub default_status: String,
    pub email_notifications: bool,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: r.user_id,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
            last_active: r.last_active,
            preferences: Preferences {
                auto_detect: r.auto_detect,
                default_status: r.default_status.parse()?,
                email_notifications: r.email_notifications,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_provided_keys() {
        let mut prefs = Preferences::default();
        PreferencesPatch {
            email_notifications: Some(true),
            ..Default::default()
        }
        .apply(&mut prefs);
        assert!(prefs.auto_detect);
        assert!(prefs.email_notifications);
        assert_eq!(prefs.default_status, ApplicationStatus::Applied);
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let a = new_user_id();
        let b = new_user_id();
        assert!(a.starts_with("user_"));
        assert_ne!(a, b);
    }
}
