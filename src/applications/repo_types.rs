use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;

/// Lifecycle status of a job application.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Interview,
    Rejected,
    Offer,
    Accepted,
    Withdrawn,
    Pending,
}

impl ApplicationStatus {
    /// Fixed reporting order.
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Interview,
        ApplicationStatus::Rejected,
        ApplicationStatus::Offer,
        ApplicationStatus::Accepted,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Pending,
    ];

    /// Statuses that count as a response from the employer.
    pub const RESPONDED: [ApplicationStatus; 3] = [
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Accepted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Withdrawn => "Withdrawn",
            ApplicationStatus::Pending => "Pending",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown application status: {s}"))
    }
}

/// Where an application record originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationSource {
    #[default]
    Extension,
    Manual,
    Import,
}

impl ApplicationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationSource::Extension => "extension",
            ApplicationSource::Manual => "manual",
            ApplicationSource::Import => "import",
        }
    }
}

impl FromStr for ApplicationSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extension" => Ok(ApplicationSource::Extension),
            "manual" => Ok(ApplicationSource::Manual),
            "import" => Ok(ApplicationSource::Import),
            other => anyhow::bail!("unknown application source: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayPeriod {
    Hourly,
    Annual,
    Monthly,
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub period: Option<PayPeriod>,
}

fn default_currency() -> Option<String> {
    Some("USD".into())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A job application owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub user_id: String,
    pub id: String,
    pub url: String,
    pub site: String,
    pub company_name: String,
    pub job_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_filename: Option<String>,
    pub status: ApplicationStatus,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_applied: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status_history: Vec<StatusEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<Salary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub application_source: ApplicationSource,
}

impl Application {
    /// Moves the application to `status`, appending to the history only on an
    /// actual transition that the history does not already end with.
    pub fn transition(&mut self, status: ApplicationStatus, at: OffsetDateTime, notes: Option<String>) {
        if self.status == status {
            return;
        }
        self.status = status;
        if self.status_history.last().map(|e| e.status) != Some(status) {
            self.status_history.push(StatusEntry {
                status,
                date: at,
                notes,
            });
        }
    }

    /// Replaces the history with `incoming` only when it extends the stored one.
    pub fn adopt_history(&mut self, incoming: Vec<StatusEntry>) -> bool {
        if incoming.len() >= self.status_history.len() && incoming.starts_with(&self.status_history) {
            self.status_history = incoming;
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, at: OffsetDateTime) {
        self.last_updated = at.max(self.date_created);
    }
}

/// Set semantics for tags while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub fn new_application_id() -> String {
    format!("app_{}", uuid::Uuid::new_v4().simple())
}

/// Row shape of the `applications` table.
#[derive(Debug, FromRow)]
pub struct ApplicationRow {
    pub user_id: String,
    pub id: String,
    pub url: String,
    pub site: String,
    pub company_name: String,
    pub job_title: String,
    pub resume_id: Option<String>,
    pub resume_name: Option<String>,
    pub resume_filename: Option<String>,
    pub status: String,
    pub tags: Vec<String>,
    pub date_applied: OffsetDateTime,
    pub date_created: OffsetDateTime,
    pub last_updated: OffsetDateTime,
    pub notes: Option<String>,
    pub status_history: Json<Vec<StatusEntry>>,
    pub salary: Option<Json<Salary>>,
    pub location: Option<Json<Location>>,
    pub application_source: String,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = anyhow::Error;

    fn try_from(r: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: r.user_id,
            id: r.id,
            url: r.url,
            site: r.site,
            company_name: r.company_name,
            job_title: r.job_title,
            resume_id: r.resume_id,
            resume_name: r.resume_name,
            resume_filename: r.resume_filename,
            status: r.status.parse()?,
            tags: r.tags,
            date_applied: r.date_applied,
            date_created: r.date_created,
            last_updated: r.last_updated,
            notes: r.notes,
            status_history: r.status_history.0,
            salary: r.salary.map(|j| j.0),
            location: r.location.map(|j| j.0),
            application_source: r.application_source.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::application as sample;
    use time::macros::datetime;

    #[test]
    fn status_round_trips_through_str() {
        for st in ApplicationStatus::ALL {
            assert_eq!(st.as_str().parse::<ApplicationStatus>().unwrap(), st);
        }
        assert!("Ghosted".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn status_index_matches_reporting_order() {
        for (i, st) in ApplicationStatus::ALL.into_iter().enumerate() {
            assert_eq!(st.index(), i);
        }
    }

    #[test]
    fn transition_appends_only_on_change() {
        let mut app = sample("app_1");
        let later = datetime!(2024-02-01 00:00 UTC);
        app.transition(ApplicationStatus::Applied, later, None);
        assert_eq!(app.status_history.len(), 1);

        app.transition(ApplicationStatus::Interview, later, Some("phone screen".into()));
        assert_eq!(app.status, ApplicationStatus::Interview);
        assert_eq!(app.status_history.len(), 2);
        assert_eq!(app.status_history[1].notes.as_deref(), Some("phone screen"));
    }

    #[test]
    fn history_is_adopted_only_when_it_extends_the_stored_one() {
        let mut app = sample("app_1");
        let mut longer = app.status_history.clone();
        longer.push(StatusEntry {
            status: ApplicationStatus::Interview,
            date: datetime!(2024-01-05 00:00 UTC),
            notes: None,
        });
        assert!(app.adopt_history(longer.clone()));
        assert_eq!(app.status_history.len(), 2);

        let rewritten = vec![StatusEntry {
            status: ApplicationStatus::Offer,
            date: datetime!(2024-01-06 00:00 UTC),
            notes: None,
        }];
        assert!(!app.adopt_history(rewritten));
        assert_eq!(app.status_history, longer);

        // status catches up without duplicating the adopted entry
        app.transition(ApplicationStatus::Interview, datetime!(2024-01-07 00:00 UTC), None);
        assert_eq!(app.status_history.len(), 2);
    }

    #[test]
    fn touch_never_goes_before_creation() {
        let mut app = sample("app_1");
        app.touch(datetime!(2023-06-01 00:00 UTC));
        assert_eq!(app.last_updated, app.date_created);
    }

    #[test]
    fn tags_are_deduplicated_in_order() {
        let tags = normalize_tags(vec![
            "remote".into(),
            " rust ".into(),
            "remote".into(),
            "".into(),
        ]);
        assert_eq!(tags, vec!["remote".to_string(), "rust".to_string()]);
    }

    #[test]
    fn salary_currency_defaults_to_usd() {
        let s: Salary = serde_json::from_str(r#"{"amount": 100000, "type": "annual"}"#).unwrap();
        assert_eq!(s.currency.as_deref(), Some("USD"));
        assert_eq!(s.period, Some(PayPeriod::Annual));
    }

    #[test]
    fn application_serializes_camel_case() {
        let json = serde_json::to_value(sample("app_1")).unwrap();
        assert_eq!(json["companyName"], "Acme");
        assert_eq!(json["lastUpdated"], "2024-01-01T00:00:00Z");
        assert_eq!(json["applicationSource"], "manual");
        assert!(json.get("notes").is_none());
    }
}
