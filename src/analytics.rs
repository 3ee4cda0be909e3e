use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::matcher::Matcher;
use crate::models::{LoggedActivity, MetricField, Metrics, Profile, ReportRow, UserTotals};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

pub fn cutoff_date(since_days: i64) -> NaiveDate {
    cutoff_from(Utc::now().date_naive(), since_days)
}

pub fn cutoff_from(today: NaiveDate, since_days: i64) -> NaiveDate {
    today - Duration::days(since_days.max(1))
}

/// Sums each user's logs on or after `cutoff`, busiest producers first.
pub fn aggregate_window(logs: &[LoggedActivity], cutoff: NaiveDate) -> Vec<UserTotals> {
    let mut totals: HashMap<Uuid, UserTotals> = HashMap::new();

    for entry in logs.iter() {
        if entry.log.activity_date < cutoff {
            continue;
        }

        let user = totals.entry(entry.log.user_id).or_insert_with(|| UserTotals {
            user_id: entry.log.user_id,
            full_name: entry.full_name.clone(),
            email: entry.email.clone(),
            days_logged: 0,
            totals: Metrics::default(),
        });
        user.days_logged += 1;
        user.totals.add(&entry.log.metrics);
    }

    let mut values: Vec<UserTotals> = totals.into_values().collect();
    values.sort_by(|a, b| {
        b.totals
            .hires_made
            .cmp(&a.totals.hires_made)
            .then(b.totals.interviews_scheduled.cmp(&a.totals.interviews_scheduled))
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    values
}

pub fn team_totals(users: &[UserTotals]) -> Metrics {
    let mut team = Metrics::default();
    for user in users {
        team.add(&user.totals);
    }
    team
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldComparison {
    pub field: MetricField,
    pub logged: Option<i32>,
    pub reported: Option<i32>,
}

impl FieldComparison {
    pub fn differs(&self) -> bool {
        matches!((self.logged, self.reported), (Some(l), Some(r)) if l != r)
    }
}

#[derive(Debug, Clone)]
pub struct PersonalComparison {
    pub matched_row: Option<String>,
    pub strategy: Option<&'static str>,
    pub fields: Vec<FieldComparison>,
}

/// Lines one user's own log up against their row in a production report.
pub fn compare_personal(
    matcher: &Matcher,
    profile: &Profile,
    logged: Option<&Metrics>,
    rows: &[ReportRow],
) -> PersonalComparison {
    let outcome = matcher.find(profile, rows);
    let reported = outcome.as_ref().map(|o| o.candidate.metrics);

    PersonalComparison {
        matched_row: outcome.as_ref().map(|o| o.candidate.employee_name.clone()),
        strategy: outcome.as_ref().map(|o| o.strategy),
        fields: MetricField::ALL
            .into_iter()
            .map(|field| FieldComparison {
                field,
                logged: logged.map(|m| m.get(field)),
                reported: reported.map(|m| m.get(field)),
            })
            .collect(),
    }
}
