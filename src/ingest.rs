//! Upload and processing of production reports.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::{ReconError, Result};
use crate::matcher::Matcher;
use crate::models::{
    Identity, LoggedActivity, NewDiscrepancy, ProductionReport, ReportRow, ReportStatus,
};
use crate::parser::{self, Cell};
use crate::reconcile;
use crate::storage;

#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub total_records: usize,
    pub matched_users: usize,
    pub unmatched_rows: Vec<String>,
    pub new_discrepancies: usize,
    pub discrepancies_found: i64,
    pub affected_users: usize,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub report: ProductionReport,
    pub summary: ProcessSummary,
}

pub async fn upload(
    pool: &PgPool,
    config: &Config,
    actor: Identity,
    source: &Path,
    report_date: NaiveDate,
) -> Result<UploadOutcome> {
    let stored =
        storage::store_upload(&config.storage_dir, actor.user_id, source, config.max_upload_bytes)
            .await?;
    info!(
        file = %stored.file_name,
        bytes = stored.size,
        format = ?stored.format,
        "stored production report upload"
    );

    let report = ProductionReport {
        id: Uuid::new_v4(),
        uploaded_by: actor.user_id,
        file_name: stored.file_name.clone(),
        file_url: stored.url(),
        report_date,
        status: ReportStatus::Pending,
        total_records: 0,
        discrepancies_found: 0,
        error_message: None,
        created_at: Utc::now(),
    };
    db::insert_report(pool, &report).await?;

    let summary = process(pool, config, report.id, &stored.path, report_date).await?;
    let report = db::fetch_report(pool, report.id).await?;
    Ok(UploadOutcome { report, summary })
}

/// Re-runs processing for a report that was already uploaded.
pub async fn reprocess(pool: &PgPool, config: &Config, report_id: Uuid) -> Result<ProcessSummary> {
    let report = db::fetch_report(pool, report_id).await?;
    if !report.status.is_terminal() {
        return Err(ReconError::InvalidInput(format!(
            "report {report_id} is still {}",
            report.status.as_str()
        )));
    }
    let path = path_from_url(&report.file_url)?;
    process(pool, config, report.id, &path, report.report_date).await
}

pub fn path_from_url(url: &str) -> Result<PathBuf> {
    url.strip_prefix("file://")
        .map(PathBuf::from)
        .ok_or_else(|| ReconError::InvalidInput(format!("unsupported file url '{url}'")))
}

/// The reads and writes report processing makes once the file is loaded.
#[async_trait]
pub(crate) trait ReportSink: Send + Sync {
    async fn set_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        message: Option<&str>,
    ) -> Result<()>;

    async fn logged_activity(&self, date: NaiveDate) -> Result<Vec<LoggedActivity>>;

    async fn replace_results(
        &self,
        report_id: Uuid,
        report_date: NaiveDate,
        rows: &[ReportRow],
        discrepancies: &[NewDiscrepancy],
    ) -> Result<(usize, usize)>;

    async fn count_discrepancies(&self, report_id: Uuid) -> Result<i64>;

    async fn complete(&self, report_id: Uuid, total_records: i32, discrepancies_found: i32)
        -> Result<()>;
}

#[async_trait]
impl ReportSink for PgPool {
    async fn set_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        message: Option<&str>,
    ) -> Result<()> {
        db::set_report_status(self, report_id, status, message).await
    }

    async fn logged_activity(&self, date: NaiveDate) -> Result<Vec<LoggedActivity>> {
        db::fetch_logged_activity(self, date).await
    }

    async fn replace_results(
        &self,
        report_id: Uuid,
        report_date: NaiveDate,
        rows: &[ReportRow],
        discrepancies: &[NewDiscrepancy],
    ) -> Result<(usize, usize)> {
        db::replace_report_results(self, report_id, report_date, rows, discrepancies).await
    }

    async fn count_discrepancies(&self, report_id: Uuid) -> Result<i64> {
        db::count_report_discrepancies(self, report_id).await
    }

    async fn complete(
        &self,
        report_id: Uuid,
        total_records: i32,
        discrepancies_found: i32,
    ) -> Result<()> {
        db::complete_report(self, report_id, total_records, discrepancies_found).await
    }
}

pub async fn process(
    pool: &PgPool,
    config: &Config,
    report_id: Uuid,
    path: &Path,
    report_date: NaiveDate,
) -> Result<ProcessSummary> {
    pool.set_status(report_id, ReportStatus::Processing, None).await?;
    let grid = load_grid(path).await;
    finish(pool, &config.email_domain, report_id, report_date, grid).await
}

async fn load_grid(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let owned_path = path.to_path_buf();
    tokio::task::spawn_blocking(move || parser::load_rows(&owned_path))
        .await
        .map_err(|e| ReconError::Parse(format!("spreadsheet reader stopped: {e}")))?
}

/// Moves a `processing` report to `completed`, or to `error` with the failure
/// message if loading or any later step failed. Nothing is written for a
/// report whose rows could not be parsed.
pub(crate) async fn finish<S: ReportSink>(
    sink: &S,
    email_domain: &str,
    report_id: Uuid,
    report_date: NaiveDate,
    grid: Result<Vec<Vec<Cell>>>,
) -> Result<ProcessSummary> {
    let outcome = match grid {
        Ok(grid) => run(sink, email_domain, report_id, report_date, &grid).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(summary) => {
            sink.complete(
                report_id,
                summary.total_records as i32,
                summary.discrepancies_found as i32,
            )
            .await?;
            if summary.discrepancies_found > 0 {
                warn!(
                    report = %report_id,
                    discrepancies = summary.discrepancies_found,
                    users = summary.affected_users,
                    "production report disagrees with logged activity"
                );
            }
            Ok(summary)
        }
        Err(err) => {
            error!(report = %report_id, error = %err, "production report processing failed");
            if let Err(status_err) = sink
                .set_status(report_id, ReportStatus::Error, Some(&err.to_string()))
                .await
            {
                error!(
                    report = %report_id,
                    error = %status_err,
                    "could not mark production report as failed"
                );
            }
            Err(err)
        }
    }
}

async fn run<S: ReportSink>(
    sink: &S,
    email_domain: &str,
    report_id: Uuid,
    report_date: NaiveDate,
    grid: &[Vec<Cell>],
) -> Result<ProcessSummary> {
    let rows = parser::parse_rows(grid, email_domain)?;
    info!(report = %report_id, rows = rows.len(), "parsed production report");

    let logs = sink.logged_activity(report_date).await?;
    let matcher = Matcher::default();
    debug!(strategies = ?matcher.strategy_names(), logs = logs.len(), "matching report rows");
    let plan = reconcile::plan(&matcher, &rows, &logs);
    for pair in &plan.matched {
        debug!(
            report = %report_id,
            user = %pair.user_id,
            row = pair.row_index,
            strategy = pair.strategy,
            "matched report row"
        );
    }
    if !plan.unmatched_rows.is_empty() {
        info!(
            report = %report_id,
            unmatched = plan.unmatched_rows.len(),
            "report rows without logged activity were skipped"
        );
    }

    let (total_records, new_discrepancies) = sink
        .replace_results(report_id, report_date, &rows, &plan.discrepancies)
        .await?;
    let discrepancies_found = sink.count_discrepancies(report_id).await?;

    Ok(ProcessSummary {
        total_records,
        matched_users: plan.matched.len(),
        affected_users: plan.affected_users(),
        unmatched_rows: plan.unmatched_rows,
        new_discrepancies,
        discrepancies_found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLog, MetricField, Metrics};
    use std::sync::Mutex;

    #[test]
    fn file_urls_round_trip_to_paths() {
        let path = path_from_url("file:///var/recon/production-reports/a/b.xlsx").unwrap();
        assert_eq!(path, PathBuf::from("/var/recon/production-reports/a/b.xlsx"));
        assert!(path_from_url("https://bucket/b.xlsx").is_err());
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Status(ReportStatus, Option<String>),
        LoggedActivity,
        Replace {
            rows: Vec<String>,
            discrepancies: Vec<NewDiscrepancy>,
        },
        Count,
        Complete(i32, i32),
    }

    #[derive(Default)]
    struct RecordingSink {
        logs: Vec<LoggedActivity>,
        fail_status: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingSink {
        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn set_status(
            &self,
            _report_id: Uuid,
            status: ReportStatus,
            message: Option<&str>,
        ) -> Result<()> {
            self.record(Call::Status(status, message.map(str::to_string)));
            if self.fail_status {
                return Err(ReconError::Database(sqlx::Error::PoolClosed));
            }
            Ok(())
        }

        async fn logged_activity(&self, _date: NaiveDate) -> Result<Vec<LoggedActivity>> {
            self.record(Call::LoggedActivity);
            Ok(self.logs.clone())
        }

        async fn replace_results(
            &self,
            _report_id: Uuid,
            _report_date: NaiveDate,
            rows: &[ReportRow],
            discrepancies: &[NewDiscrepancy],
        ) -> Result<(usize, usize)> {
            self.record(Call::Replace {
                rows: rows.iter().map(|r| r.employee_name.clone()).collect(),
                discrepancies: discrepancies.to_vec(),
            });
            Ok((rows.len(), discrepancies.len()))
        }

        async fn count_discrepancies(&self, _report_id: Uuid) -> Result<i64> {
            self.record(Call::Count);
            let calls = self.calls();
            let stored = calls.iter().rev().find_map(|call| match call {
                Call::Replace { discrepancies, .. } => Some(discrepancies.len() as i64),
                _ => None,
            });
            Ok(stored.unwrap_or(0))
        }

        async fn complete(
            &self,
            _report_id: Uuid,
            total_records: i32,
            discrepancies_found: i32,
        ) -> Result<()> {
            self.record(Call::Complete(total_records, discrepancies_found));
            Ok(())
        }
    }

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn jane_log(hires: i32) -> LoggedActivity {
        LoggedActivity {
            log: ActivityLog {
                user_id: Uuid::new_v4(),
                activity_date: date(),
                metrics: Metrics {
                    interviews_scheduled: 5,
                    offers_sent: 2,
                    hires_made: hires,
                    candidates_contacted: 0,
                },
                notes: None,
            },
            full_name: "Jane Doe".to_string(),
            email: "jane.doe@company.com".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_header_marks_report_as_error_without_writing_entries() {
        let sink = RecordingSink::default();
        let grid = vec![
            vec![text("Name"), text("Hires Made")],
            vec![text("Jane Doe"), Cell::Number(1.0)],
        ];

        let err = finish(&sink, "company.com", Uuid::new_v4(), date(), Ok(grid))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Parse(_)));
        assert_eq!(
            sink.calls(),
            vec![Call::Status(ReportStatus::Error, Some(err.to_string()))]
        );
    }

    #[tokio::test]
    async fn load_failures_are_stored_on_the_report() {
        let sink = RecordingSink::default();
        let load = Err(ReconError::UnsupportedFormat("PDF production reports".to_string()));

        let err = finish(&sink, "company.com", Uuid::new_v4(), date(), load)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::UnsupportedFormat(_)));
        match sink.calls().as_slice() {
            [Call::Status(ReportStatus::Error, Some(message))] => assert!(message.contains("PDF")),
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_status_update_keeps_the_processing_error() {
        let sink = RecordingSink {
            fail_status: true,
            ..RecordingSink::default()
        };
        let grid = vec![vec![text("Weekly production")]];

        let err = finish(&sink, "company.com", Uuid::new_v4(), date(), Ok(grid))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Parse(_)));
    }

    #[tokio::test]
    async fn parsed_report_is_reconciled_and_completed() {
        let jane = jane_log(0);
        let sink = RecordingSink {
            logs: vec![jane.clone()],
            ..RecordingSink::default()
        };
        let grid = vec![
            vec![
                text("Recruiter Name"),
                text("Interviews Scheduled"),
                text("Offers Sent"),
                text("Hires Made"),
            ],
            vec![
                text("Jane Doe"),
                Cell::Number(5.0),
                Cell::Number(2.0),
                Cell::Number(1.0),
            ],
        ];

        let summary = finish(&sink, "company.com", Uuid::new_v4(), date(), Ok(grid))
            .await
            .unwrap();
        assert_eq!(summary.total_records, 1);
        assert_eq!(summary.matched_users, 1);
        assert_eq!(summary.discrepancies_found, 1);
        assert_eq!(
            sink.calls(),
            vec![
                Call::LoggedActivity,
                Call::Replace {
                    rows: vec!["Jane Doe".to_string()],
                    discrepancies: vec![NewDiscrepancy {
                        user_id: jane.log.user_id,
                        field: MetricField::HiresMade,
                        reported_value: 1,
                        logged_value: 0,
                    }],
                },
                Call::Count,
                Call::Complete(1, 1),
            ]
        );
    }
}
