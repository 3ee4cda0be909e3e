use uuid::Uuid;

use crate::matcher::Matcher;
use crate::models::{LoggedActivity, MetricField, Metrics, NewDiscrepancy, ReportRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub user_id: Uuid,
    pub row_index: usize,
    pub strategy: &'static str,
}

#[derive(Debug, Default)]
pub struct ReconciliationPlan {
    pub matched: Vec<MatchedPair>,
    pub discrepancies: Vec<NewDiscrepancy>,
    pub unmatched_rows: Vec<String>,
}

impl ReconciliationPlan {
    pub fn affected_users(&self) -> usize {
        let mut users: Vec<Uuid> = self.discrepancies.iter().map(|d| d.user_id).collect();
        users.sort();
        users.dedup();
        users.len()
    }
}

/// Emits one discrepancy per field whose reported value differs from the logged one.
pub fn reconcile(user_id: Uuid, logged: &Metrics, reported: &Metrics) -> Vec<NewDiscrepancy> {
    MetricField::ALL
        .into_iter()
        .filter(|field| logged.get(*field) != reported.get(*field))
        .map(|field| NewDiscrepancy {
            user_id,
            field,
            reported_value: reported.get(field),
            logged_value: logged.get(field),
        })
        .collect()
}

/// Pairs the day's activity logs with report rows and collects every mismatch.
///
/// Every exact-name pair is made before any looser strategy runs, and each
/// log and each row is used at most once. Rows with no matching user are
/// reported back but otherwise ignored.
pub fn plan(matcher: &Matcher, rows: &[ReportRow], logs: &[LoggedActivity]) -> ReconciliationPlan {
    let mut row_matched = vec![false; rows.len()];
    let mut result = ReconciliationPlan::default();

    for assignment in matcher.assign(logs, rows) {
        let logged = &logs[assignment.subject];
        let row = &rows[assignment.candidate];
        row_matched[assignment.candidate] = true;
        result.matched.push(MatchedPair {
            user_id: logged.log.user_id,
            row_index: assignment.candidate,
            strategy: assignment.strategy,
        });
        result
            .discrepancies
            .extend(reconcile(logged.log.user_id, &logged.log.metrics, &row.metrics));
    }

    for (row, matched) in rows.iter().zip(row_matched) {
        if !matched {
            tracing::debug!(employee = %row.employee_name, "no logged activity matches report row");
            result.unmatched_rows.push(row.employee_name.clone());
        }
    }

    result
}
