use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use crate::analytics;
use crate::db;
use crate::error::Result;
use crate::models::{
    DiscrepancyStatus, MetricField, Metrics, ProductionReport, ReportRow, UserTotals,
};

#[derive(Debug, Clone)]
pub enum SummarySource {
    Report {
        report: ProductionReport,
        entries: Vec<ReportRow>,
        pending_discrepancies: usize,
    },
    ActivityWindow {
        since: NaiveDate,
        users: Vec<UserTotals>,
    },
}

/// Prefers the latest report dated today or yesterday, else the activity window.
pub async fn collect(pool: &PgPool, today: NaiveDate, window_days: i64) -> Result<SummarySource> {
    if let Some(report) = db::fetch_latest_report(pool, today - Duration::days(1), today).await? {
        let entries = db::fetch_report_entries(pool, report.id).await?;
        let pending_discrepancies =
            db::fetch_discrepancies(pool, Some(DiscrepancyStatus::Pending), Some(report.id))
                .await?
                .len();
        return Ok(SummarySource::Report {
            report,
            entries,
            pending_discrepancies,
        });
    }

    let since = analytics::cutoff_from(today, window_days);
    let logs = db::fetch_activity_window(pool, since, None).await?;
    Ok(SummarySource::ActivityWindow {
        since,
        users: analytics::aggregate_window(&logs, since),
    })
}

pub fn subject_line(source: &SummarySource) -> String {
    match source {
        SummarySource::Report { report, .. } => {
            format!("Production report summary for {}", report.report_date)
        }
        SummarySource::ActivityWindow { since, .. } => {
            format!("Team activity summary since {since}")
        }
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_totals_row(output: &mut String, label: &str, metrics: &Metrics) {
    let _ = write!(output, "<tr><td>{}</td>", escape_html(label));
    for field in MetricField::ALL {
        let _ = write!(output, "<td>{}</td>", metrics.get(field));
    }
    let _ = writeln!(output, "</tr>");
}

fn write_table_header(output: &mut String, first_column: &str) {
    let _ = write!(output, "<table><tr><th>{first_column}</th>");
    for field in MetricField::ALL {
        let _ = write!(output, "<th>{}</th>", field.label());
    }
    let _ = writeln!(output, "</tr>");
}

pub fn build_summary_html(source: &SummarySource) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<html><body>");
    let _ = writeln!(output, "<h1>{}</h1>", escape_html(&subject_line(source)));

    match source {
        SummarySource::Report {
            report,
            entries,
            pending_discrepancies,
        } => {
            let mut team = Metrics::default();
            for entry in entries {
                team.add(&entry.metrics);
            }

            let _ = writeln!(
                output,
                "<p>Source file: {} ({} records, {} discrepancies found, {} awaiting review)</p>",
                escape_html(&report.file_name),
                report.total_records,
                report.discrepancies_found,
                pending_discrepancies
            );

            if entries.is_empty() {
                let _ = writeln!(output, "<p>The report contained no employee rows.</p>");
            } else {
                write_table_header(&mut output, "Recruiter");
                for entry in entries {
                    write_totals_row(&mut output, &entry.employee_name, &entry.metrics);
                }
                write_totals_row(&mut output, "Team total", &team);
                let _ = writeln!(output, "</table>");
            }
        }
        SummarySource::ActivityWindow { since, users } => {
            let _ = writeln!(
                output,
                "<p>No production report was uploaded for today or yesterday. \
                 Showing self-reported activity since {since}.</p>"
            );

            if users.is_empty() {
                let _ = writeln!(output, "<p>No activity was logged in this window.</p>");
            } else {
                write_table_header(&mut output, "Recruiter");
                for user in users {
                    let label = format!("{} ({} days)", user.full_name, user.days_logged);
                    write_totals_row(&mut output, &label, &user.totals);
                }
                write_totals_row(&mut output, "Team total", &analytics::team_totals(users));
                let _ = writeln!(output, "</table>");
            }
        }
    }

    let _ = writeln!(output, "</body></html>");
    output
}
