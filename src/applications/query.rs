use std::cmp::Ordering;

use serde::Deserialize;
use time::OffsetDateTime;

use super::repo_types::{Application, ApplicationStatus};

/// Which fields a free-text query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope {
    /// Company name or job title.
    CompanyOrTitle,
    /// Company, title, resume name, notes and tags.
    Everything,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub needle: String,
    pub scope: TextScope,
}

/// Predicates over a user's applications. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub statuses: Vec<ApplicationStatus>,
    pub tags_any: Vec<String>,
    pub text: Option<TextQuery>,
    pub company: Option<String>,
    pub applied_from: Option<OffsetDateTime>,
    pub applied_to: Option<OffsetDateTime>,
    /// `lastUpdated > t OR dateCreated > t`
    pub changed_since: Option<OffsetDateTime>,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl ApplicationFilter {
    pub fn with_statuses(statuses: impl IntoIterator<Item = ApplicationStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn applied_since(from: OffsetDateTime) -> Self {
        Self {
            applied_from: Some(from),
            ..Self::default()
        }
    }

    pub fn changed_since(since: Option<OffsetDateTime>) -> Self {
        Self {
            changed_since: since,
            ..Self::default()
        }
    }

    pub fn matches(&self, app: &Application) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&app.status) {
            return false;
        }
        if !self.tags_any.is_empty() && !app.tags.iter().any(|t| self.tags_any.contains(t)) {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.needle.to_lowercase();
            let mut hit = contains_ci(&app.company_name, &needle) || contains_ci(&app.job_title, &needle);
            if !hit && text.scope == TextScope::Everything {
                hit = app.resume_name.as_deref().is_some_and(|v| contains_ci(v, &needle))
                    || app.notes.as_deref().is_some_and(|v| contains_ci(v, &needle))
                    || app.tags.iter().any(|t| contains_ci(t, &needle));
            }
            if !hit {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if !contains_ci(&app.company_name, &company.to_lowercase()) {
                return false;
            }
        }
        if self.applied_from.is_some_and(|from| app.date_applied < from) {
            return false;
        }
        if self.applied_to.is_some_and(|to| app.date_applied > to) {
            return false;
        }
        if let Some(since) = self.changed_since {
            if !(app.last_updated > since || app.date_created > since) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    DateApplied,
    DateCreated,
    LastUpdated,
    CompanyName,
    JobTitle,
    Status,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::DateApplied => "date_applied",
            SortField::DateCreated => "date_created",
            SortField::LastUpdated => "last_updated",
            SortField::CompanyName => "company_name",
            SortField::JobTitle => "job_title",
            SortField::Status => "status",
        }
    }

    fn compare(self, a: &Application, b: &Application) -> Ordering {
        match self {
            SortField::DateApplied => a.date_applied.cmp(&b.date_applied),
            SortField::DateCreated => a.date_created.cmp(&b.date_created),
            SortField::LastUpdated => a.last_updated.cmp(&b.last_updated),
            SortField::CompanyName => a.company_name.cmp(&b.company_name),
            SortField::JobTitle => a.job_title.cmp(&b.job_title),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filtered, sorted, paginated scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationQuery {
    pub filter: ApplicationFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl ApplicationQuery {
    pub fn all(filter: ApplicationFilter) -> Self {
        Self {
            filter,
            sort: SortField::DateApplied,
            order: SortOrder::Desc,
            limit: i64::MAX,
            offset: 0,
        }
    }

    /// Ordering used for in-memory evaluation; ties fall back to id so pages are stable.
    pub fn compare(&self, a: &Application, b: &Application) -> Ordering {
        let ord = self.sort.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}
