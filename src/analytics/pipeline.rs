//! Typed grouping queries over applications.
//!
//! A [`GroupCount`] is a complete description of a `match -> group -> sort ->
//! limit` aggregation. The Postgres store renders it to SQL and the in-memory
//! store evaluates it with [`GroupCount::evaluate`], so both share one shape.

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::applications::{
    query::ApplicationFilter,
    repo_types::{Application, ApplicationStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Status,
    Company,
    /// `(year, month)` of `dateApplied`, in UTC.
    YearMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    Unordered,
    /// Descending by group key.
    KeyDesc,
    /// Descending by count, ties ascending by key.
    CountDesc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupValue {
    Status(ApplicationStatus),
    Company(String),
    YearMonth { year: i32, month: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: GroupValue,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub filter: ApplicationFilter,
    pub key: GroupKey,
    pub order: GroupOrder,
    pub limit: Option<i64>,
}

impl GroupCount {
    pub fn by(key: GroupKey) -> Self {
        Self {
            filter: ApplicationFilter::default(),
            key,
            order: GroupOrder::Unordered,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: ApplicationFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order(mut self, order: GroupOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn key_of(&self, app: &Application) -> GroupValue {
        match self.key {
            GroupKey::Status => GroupValue::Status(app.status),
            GroupKey::Company => GroupValue::Company(app.company_name.clone()),
            GroupKey::YearMonth => {
                let d = app.date_applied.to_offset(time::UtcOffset::UTC);
                GroupValue::YearMonth {
                    year: d.year(),
                    month: u8::from(d.month()),
                }
            }
        }
    }

    pub fn evaluate<'a>(&self, apps: impl IntoIterator<Item = &'a Application>) -> Vec<Bucket> {
        let mut counts: HashMap<GroupValue, i64> = HashMap::new();
        for app in apps.into_iter().filter(|a| self.filter.matches(a)) {
            *counts.entry(self.key_of(app)).or_default() += 1;
        }
        let mut buckets: Vec<Bucket> = counts
            .into_iter()
            .map(|(key, count)| Bucket { key, count })
            .collect();
        match self.order {
            GroupOrder::Unordered => buckets.sort_by(|a, b| a.key.cmp(&b.key)),
            GroupOrder::KeyDesc => buckets.sort_by(|a, b| b.key.cmp(&a.key)),
            GroupOrder::CountDesc => {
                buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)))
            }
        }
        if let Some(limit) = self.limit {
            buckets.truncate(limit.max(0) as usize);
        }
        buckets
    }
}

/// Milliseconds between `dateApplied` and `lastUpdated`.
pub fn response_millis(app: &Application) -> f64 {
    let span: time::Duration = app.last_updated - app.date_applied;
    span.whole_milliseconds() as f64
}

/// Mean response time over matching applications, `None` when nothing matches.
pub fn mean_response_millis<'a>(
    filter: &ApplicationFilter,
    apps: impl IntoIterator<Item = &'a Application>,
) -> Option<f64> {
    let (sum, n) = apps
        .into_iter()
        .filter(|a| filter.matches(a))
        .fold((0.0_f64, 0_u64), |(sum, n), a| (sum + response_millis(a), n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn days_ago(now: OffsetDateTime, days: i64) -> OffsetDateTime {
    now - time::Duration::days(days)
}
