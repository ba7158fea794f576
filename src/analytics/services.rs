use time::OffsetDateTime;

use super::dto::{AnalyticsResponse, CompanyCount, MonthKey, MonthlyTrend, Overview, StatusDistribution};
use super::pipeline::{days_ago, Bucket, GroupCount, GroupKey, GroupOrder, GroupValue};
use crate::applications::{query::ApplicationFilter, repo::ApplicationStore, repo_types::ApplicationStatus};
use crate::db::Store;
use crate::resumes::repo::ResumeStore;
use crate::error::AppResult;

const RECENT_DAYS: i64 = 30;
const MONTHS_SHOWN: i64 = 12;
const TOP_COMPANIES: i64 = 10;
const DAY_MILLIS: f64 = 86_400_000.0;

/// `part / total * 100` rounded to one decimal, 0 when `total` is 0.
pub fn percent(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

pub fn whole_days(millis: f64) -> i64 {
    (millis / DAY_MILLIS).round() as i64
}

fn distribution(buckets: Vec<Bucket>) -> StatusDistribution {
    let mut dist = StatusDistribution::default();
    for b in buckets {
        if let GroupValue::Status(status) = b.key {
            dist.set(status, b.count);
        }
    }
    dist
}

fn monthly(buckets: Vec<Bucket>) -> Vec<MonthlyTrend> {
    buckets
        .into_iter()
        .filter_map(|b| match b.key {
            GroupValue::YearMonth { year, month } => Some(MonthlyTrend {
                id: MonthKey { year, month },
                count: b.count,
            }),
            _ => None,
        })
        .collect()
}

fn companies(buckets: Vec<Bucket>) -> Vec<CompanyCount> {
    buckets
        .into_iter()
        .filter_map(|b| match b.key {
            GroupValue::Company(company) => Some(CompanyCount {
                company,
                count: b.count,
            }),
            _ => None,
        })
        .collect()
}

/// Runs the seven independent sub-queries concurrently; any failure fails
/// the whole report.
pub async fn compute<S: Store + ?Sized>(
    store: &S,
    user_id: &str,
    now: OffsetDateTime,
) -> AppResult<AnalyticsResponse> {
    let everything = ApplicationFilter::default();
    let recent = ApplicationFilter::applied_since(days_ago(now, RECENT_DAYS));
    let responded = ApplicationFilter::with_statuses(ApplicationStatus::RESPONDED);
    let by_status = GroupCount::by(GroupKey::Status);
    let by_month = GroupCount::by(GroupKey::YearMonth)
        .order(GroupOrder::KeyDesc)
        .limit(MONTHS_SHOWN);
    let by_company = GroupCount::by(GroupKey::Company)
        .order(GroupOrder::CountDesc)
        .limit(TOP_COMPANIES);

    let (total, statuses, recent, resumes, months, top, mean_millis) = tokio::try_join!(
        store.count_applications(user_id, &everything),
        store.group_applications(user_id, &by_status),
        store.count_applications(user_id, &recent),
        store.count_active_resumes(user_id),
        store.group_applications(user_id, &by_month),
        store.group_applications(user_id, &by_company),
        store.mean_response_millis(user_id, &responded),
    )?;

    let status_distribution = distribution(statuses);
    Ok(AnalyticsResponse {
        overview: Overview {
            total_applications: total,
            recent_applications: recent,
            total_resumes: resumes,
            response_rate: percent(status_distribution.sum_of(&ApplicationStatus::RESPONDED), total),
            success_rate: percent(status_distribution.get(ApplicationStatus::Accepted), total),
        },
        status_distribution,
        monthly_trends: monthly(months),
        top_companies: companies(top),
        average_response_time: mean_millis.map(whole_days),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::{application, resume, USER};
    use time::macros::datetime;

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(3, 3), 100.0);
    }

    #[test]
    fn whole_days_rounds_to_nearest() {
        assert_eq!(whole_days(DAY_MILLIS * 2.4), 2);
        assert_eq!(whole_days(DAY_MILLIS * 2.6), 3);
    }

    #[tokio::test]
    async fn empty_account_reports_zeros_and_null() {
        let store = MemoryStore::new();
        let report = compute(&store, USER, OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(report.overview.total_applications, 0);
        assert_eq!(report.overview.response_rate, 0.0);
        assert_eq!(report.overview.success_rate, 0.0);
        assert_eq!(report.average_response_time, None);
        assert!(report.monthly_trends.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        let dist = json["statusDistribution"].as_object().unwrap();
        assert_eq!(dist.len(), 7);
        assert!(dist.values().all(|v| v == 0));
    }

    #[tokio::test]
    async fn report_over_mixed_statuses() {
        let store = MemoryStore::new();
        let now = datetime!(2024-03-31 00:00 UTC);
        let rows = [
            ("Acme", ApplicationStatus::Interview, datetime!(2024-03-20 00:00 UTC), 2),
            ("Acme", ApplicationStatus::Accepted, datetime!(2024-02-10 00:00 UTC), 4),
            ("Globex", ApplicationStatus::Rejected, datetime!(2024-02-01 00:00 UTC), 1),
            ("Initech", ApplicationStatus::Applied, datetime!(2023-11-05 00:00 UTC), 0),
        ];
        for (i, (company, status, applied, days)) in rows.into_iter().enumerate() {
            let mut a = application(&format!("app_{i}"));
            a.company_name = company.into();
            a.status = status;
            a.date_applied = applied;
            a.date_created = applied;
            a.last_updated = applied + time::Duration::days(days);
            store.insert_application(&a).await.unwrap();
        }
        store.insert_resume(&resume("resume_1")).await.unwrap();
        store.insert_resume(&resume("resume_2")).await.unwrap();
        store.delete_resume(USER, "resume_2").await.unwrap();

        let report = compute(&store, USER, now).await.unwrap();
        assert_eq!(report.overview.total_applications, 4);
        assert_eq!(report.overview.recent_applications, 1);
        assert_eq!(report.overview.total_resumes, 1);
        assert_eq!(report.overview.response_rate, 50.0);
        assert_eq!(report.overview.success_rate, 25.0);
        assert_eq!(report.status_distribution.total(), 4);
        assert_eq!(report.status_distribution.get(ApplicationStatus::Interview), 1);
        // mean of 2 and 4 days over responded applications
        assert_eq!(report.average_response_time, Some(3));

        assert_eq!(
            report.monthly_trends.iter().map(|m| (m.id.year, m.id.month)).collect::<Vec<_>>(),
            vec![(2024, 3), (2024, 2), (2023, 11)]
        );
        assert_eq!(report.top_companies[0].company, "Acme");
        assert_eq!(report.top_companies[0].count, 2);
        assert_eq!(report.top_companies.len(), 3);
    }

    #[tokio::test]
    async fn other_users_do_not_leak_into_the_report() {
        let store = MemoryStore::new();
        let mut a = application("app_1");
        a.user_id = "user_b".into();
        store.insert_application(&a).await.unwrap();
        let report = compute(&store, USER, OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(report.overview.total_applications, 0);
        assert!(report.top_companies.is_empty());
    }
}
