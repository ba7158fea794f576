use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::applications::repo_types::ApplicationStatus;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_applications: i64,
    pub recent_applications: i64,
    pub total_resumes: i64,
    pub response_rate: f64,
    pub success_rate: f64,
}

/// Counts per status. Serializes every status in reporting order, zeros included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusDistribution([i64; 7]);

impl StatusDistribution {
    pub fn get(&self, status: ApplicationStatus) -> i64 {
        self.0[status.index()]
    }

    pub fn set(&mut self, status: ApplicationStatus, count: i64) {
        self.0[status.index()] = count;
    }

    pub fn sum_of(&self, statuses: &[ApplicationStatus]) -> i64 {
        statuses.iter().map(|s| self.get(*s)).sum()
    }

    pub fn total(&self) -> i64 {
        self.0.iter().sum()
    }
}

impl Serialize for StatusDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ApplicationStatus::ALL.len()))?;
        for status in ApplicationStatus::ALL {
            map.serialize_entry(status.as_str(), &self.get(status))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MonthKey {
    pub year: i32,
    pub month: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthlyTrend {
    #[serde(rename = "_id")]
    pub id: MonthKey,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompanyCount {
    #[serde(rename = "_id")]
    pub company: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub overview: Overview,
    pub status_distribution: StatusDistribution,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub top_companies: Vec<CompanyCount>,
    /// Whole days, `null` when nothing has had a response yet.
    pub average_response_time: Option<i64>,
}
