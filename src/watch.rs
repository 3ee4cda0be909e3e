//! Polling change feed over reports and discrepancies.

use std::time::Duration;

use sqlx::PgPool;
use tracing::info;

use crate::db;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub reports: i64,
    pub processing_reports: i64,
    pub pending_discrepancies: i64,
    pub resolved_discrepancies: i64,
    pub activity_logs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    ReportsUploaded(i64),
    ProcessingChanged { from: i64, to: i64 },
    DiscrepanciesRaised(i64),
    DiscrepanciesResolved(i64),
    ActivityLogged(i64),
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::ReportsUploaded(n) => write!(f, "{n} new production report(s)"),
            Change::ProcessingChanged { from, to } => {
                write!(f, "reports processing: {from} -> {to}")
            }
            Change::DiscrepanciesRaised(n) => write!(f, "{n} new discrepancy(ies) pending review"),
            Change::DiscrepanciesResolved(n) => write!(f, "{n} discrepancy(ies) resolved"),
            Change::ActivityLogged(n) => write!(f, "{n} new activity log(s)"),
        }
    }
}

pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    if current.reports > previous.reports {
        changes.push(Change::ReportsUploaded(current.reports - previous.reports));
    }
    if current.processing_reports != previous.processing_reports {
        changes.push(Change::ProcessingChanged {
            from: previous.processing_reports,
            to: current.processing_reports,
        });
    }

    let resolved = current.resolved_discrepancies - previous.resolved_discrepancies;
    let total_before = previous.pending_discrepancies + previous.resolved_discrepancies;
    let total_after = current.pending_discrepancies + current.resolved_discrepancies;
    if total_after > total_before {
        changes.push(Change::DiscrepanciesRaised(total_after - total_before));
    }
    if resolved > 0 {
        changes.push(Change::DiscrepanciesResolved(resolved));
    }

    if current.activity_logs > previous.activity_logs {
        changes.push(Change::ActivityLogged(current.activity_logs - previous.activity_logs));
    }

    changes
}

/// Polls until `max_polls` snapshots have been taken, or forever when `None`.
pub async fn run(pool: &PgPool, interval: Duration, max_polls: Option<usize>) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut previous: Option<Snapshot> = None;
    let mut polls = 0usize;

    loop {
        ticker.tick().await;
        let current = db::fetch_snapshot(pool).await?;

        match &previous {
            None => info!(
                pending = current.pending_discrepancies,
                reports = current.reports,
                "watching for changes"
            ),
            Some(previous) => {
                for change in diff(previous, &current) {
                    info!("{change}");
                    println!("{change}");
                }
            }
        }
        previous = Some(current);

        polls += 1;
        if max_polls.is_some_and(|max| polls >= max) {
            return Ok(());
        }
    }
}
