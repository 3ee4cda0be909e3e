use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analytics;
mod config;
mod db;
mod error;
mod ingest;
mod mailer;
mod matcher;
mod models;
mod parser;
mod reconcile;
mod review;
mod storage;
mod summary;
mod watch;

use config::Config;
use models::{ActivityLog, DiscrepancyStatus, Identity, Metrics, Profile};
use review::Decision;

#[derive(Parser)]
#[command(name = "production-recon")]
#[command(about = "Reconciles uploaded production reports against recruiter activity logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DecisionArg {
    Approve,
    Reject,
}

impl From<DecisionArg> for Decision {
    fn from(value: DecisionArg) -> Self {
        match value {
            DecisionArg::Approve => Decision::Approve,
            DecisionArg::Reject => Decision::Reject,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusArg {
    fn filter(self) -> Option<DiscrepancyStatus> {
        match self {
            StatusArg::Pending => Some(DiscrepancyStatus::Pending),
            StatusArg::Approved => Some(DiscrepancyStatus::Approved),
            StatusArg::Rejected => Some(DiscrepancyStatus::Rejected),
            StatusArg::All => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Record (or overwrite) a day of activity for a user
    LogActivity {
        #[arg(long = "as")]
        user: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        interviews: i32,
        #[arg(long, default_value_t = 0)]
        offers: i32,
        #[arg(long, default_value_t = 0)]
        hires: i32,
        #[arg(long, default_value_t = 0)]
        contacts: i32,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Upload a production report spreadsheet and reconcile it
    Upload {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long = "as")]
        user: String,
    },
    /// Run processing again for an uploaded report
    Reprocess {
        #[arg(long)]
        report: uuid::Uuid,
    },
    /// List recent production reports
    Reports {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// List discrepancies
    Discrepancies {
        #[arg(long, value_enum, default_value_t = StatusArg::Pending)]
        status: StatusArg,
        #[arg(long)]
        report: Option<uuid::Uuid>,
        #[arg(long, conflicts_with = "json")]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Approve or reject a pending discrepancy
    Review {
        #[arg(long)]
        id: uuid::Uuid,
        #[arg(long, value_enum)]
        decision: DecisionArg,
        #[arg(long = "as")]
        user: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Per-recruiter totals over a trailing window
    Analytics {
        #[arg(long, default_value_t = analytics::DEFAULT_WINDOW_DAYS)]
        since_days: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compare a user's log with their row in the latest report for a date
    Lookup {
        #[arg(long = "as")]
        user: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Build the summary and email it to managers
    Summary {
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long, default_value_t = analytics::DEFAULT_WINDOW_DAYS)]
        since_days: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Poll for report and discrepancy changes
    Watch {
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        #[arg(long)]
        polls: Option<usize>,
    },
}

async fn resolve_user(pool: &PgPool, email: &str) -> anyhow::Result<Profile> {
    let profile = db::find_profile_by_email(pool, email)
        .await?
        .with_context(|| format!("no user with email {email}"))?;
    tracing::debug!(user = %profile.email, role = profile.role.as_str(), "resolved acting user");
    Ok(profile)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()
        .context("failed to load configuration (DATABASE_URL must be set)")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::LogActivity {
            user,
            date,
            interviews,
            offers,
            hires,
            contacts,
            notes,
        } => {
            let profile = resolve_user(&pool, &user).await?;
            let metrics = Metrics {
                interviews_scheduled: interviews,
                offers_sent: offers,
                hires_made: hires,
                candidates_contacted: contacts,
            };
            metrics.ensure_non_negative()?;
            let activity_date = date.unwrap_or_else(|| Utc::now().date_naive());
            db::upsert_activity_log(
                &pool,
                &ActivityLog {
                    user_id: profile.id,
                    activity_date,
                    metrics,
                    notes,
                },
            )
            .await?;
            println!("Activity saved for {} on {}.", profile.full_name, activity_date);
        }
        Commands::Upload { file, date, user } => {
            let profile = resolve_user(&pool, &user).await?;
            let outcome = ingest::upload(&pool, &config, Identity::from(&profile), &file, date)
                .await
                .with_context(|| format!("failed to process {}", file.display()))?;
            print_process_summary(&outcome.report.file_name, &outcome.summary);
            println!("Report id: {}", outcome.report.id);
        }
        Commands::Reprocess { report } => {
            let summary = ingest::reprocess(&pool, &config, report).await?;
            print_process_summary(&report.to_string(), &summary);
        }
        Commands::Reports { limit } => {
            let reports = db::fetch_reports(&pool, limit).await?;
            if reports.is_empty() {
                println!("No production reports uploaded yet.");
                return Ok(());
            }
            for report in reports {
                println!(
                    "- {} {} [{}] {} records, {} discrepancies ({}){}",
                    report.report_date,
                    report.file_name,
                    report.status.as_str(),
                    report.total_records,
                    report.discrepancies_found,
                    report.id,
                    report
                        .error_message
                        .map(|message| format!(": {message}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Discrepancies {
            status,
            report,
            csv,
            json,
        } => {
            let discrepancies = db::fetch_discrepancies(&pool, status.filter(), report).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&discrepancies)?);
                return Ok(());
            }

            if let Some(path) = csv {
                let mut writer = csv::Writer::from_path(&path)?;
                for discrepancy in &discrepancies {
                    writer.serialize(discrepancy)?;
                }
                writer.flush()?;
                println!("Wrote {} discrepancies to {}.", discrepancies.len(), path.display());
                return Ok(());
            }

            if discrepancies.is_empty() {
                println!("No discrepancies found.");
                return Ok(());
            }
            for d in discrepancies {
                println!(
                    "- {} {} on {}: {} reported {}, logged {} [{}] ({})",
                    d.report_date,
                    d.user_name,
                    d.field.label(),
                    d.field,
                    d.reported_value,
                    d.logged_value,
                    d.status.as_str(),
                    d.id
                );
            }
        }
        Commands::Review {
            id,
            decision,
            user,
            notes,
        } => {
            let profile = resolve_user(&pool, &user).await?;
            let resolution =
                review::resolve(&pool, Identity::from(&profile), id, decision.into(), notes)
                    .await?;
            println!(
                "Discrepancy {} marked {} by {}.",
                resolution.discrepancy_id,
                resolution.status.as_str(),
                profile.full_name
            );
        }
        Commands::Analytics { since_days, limit } => {
            let since_date = analytics::cutoff_date(since_days);
            let logs = db::fetch_activity_window(&pool, since_date, None).await?;
            let totals = analytics::aggregate_window(&logs, since_date);

            if totals.is_empty() {
                println!("No activity logged for this window.");
                return Ok(());
            }

            println!("Top recruiters since {since_date}:");
            for user in totals.iter().take(limit) {
                println!(
                    "- {} ({}) {} interviews, {} offers, {} hires, {} contacts across {} days",
                    user.full_name,
                    user.email,
                    user.totals.interviews_scheduled,
                    user.totals.offers_sent,
                    user.totals.hires_made,
                    user.totals.candidates_contacted,
                    user.days_logged
                );
            }
        }
        Commands::Lookup { user, date } => {
            let profile = resolve_user(&pool, &user).await?;
            let logged = db::fetch_activity_log(&pool, profile.id, date).await?;
            let Some(report) = db::fetch_latest_report(&pool, date, date).await? else {
                println!("No completed production report for {date}.");
                return Ok(());
            };
            let rows = db::fetch_report_entries(&pool, report.id).await?;

            let comparison = analytics::compare_personal(
                &matcher::Matcher::default(),
                &profile,
                logged.as_ref().map(|l| &l.log.metrics),
                &rows,
            );
            match (&comparison.matched_row, comparison.strategy) {
                (Some(row), Some(strategy)) => {
                    println!("{} matched report row '{}' by {}.", profile.full_name, row, strategy)
                }
                _ => println!("{} has no row in report {}.", profile.full_name, report.file_name),
            }
            for field in &comparison.fields {
                let show = |value: Option<i32>| value.map_or("-".to_string(), |v| v.to_string());
                println!(
                    "- {}: logged {}, reported {}{}",
                    field.field.label(),
                    show(field.logged),
                    show(field.reported),
                    if field.differs() { " (differs)" } else { "" }
                );
            }
        }
        Commands::Summary {
            today,
            since_days,
            out,
        } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let source = summary::collect(&pool, today, since_days).await?;
            let subject = summary::subject_line(&source);
            let html = summary::build_summary_html(&source);

            if let Some(out) = out {
                std::fs::write(&out, html)?;
                println!("Summary written to {}.", out.display());
                return Ok(());
            }

            let recipients: Vec<String> = db::fetch_managers(&pool)
                .await?
                .into_iter()
                .map(|manager| manager.email)
                .collect();
            if recipients.is_empty() {
                println!("No manager or admin users to notify.");
                return Ok(());
            }
            let delivered = mailer::send_html(&config, &recipients, &subject, &html).await?;
            println!("Summary sent to {delivered} of {} recipients.", recipients.len());
        }
        Commands::Watch {
            interval_secs,
            polls,
        } => {
            watch::run(&pool, Duration::from_secs(interval_secs.max(1)), polls).await?;
        }
    }

    Ok(())
}

fn print_process_summary(label: &str, summary: &ingest::ProcessSummary) {
    println!(
        "Processed {}: {} records, {} matched to logged activity.",
        label, summary.total_records, summary.matched_users
    );
    if !summary.unmatched_rows.is_empty() {
        println!(
            "{} rows had no logged activity: {}",
            summary.unmatched_rows.len(),
            summary.unmatched_rows.join(", ")
        );
    }
    if summary.discrepancies_found > 0 {
        println!(
            "Warning: {} discrepancies across {} users ({} new) need manager review.",
            summary.discrepancies_found, summary.affected_users, summary.new_discrepancies
        );
    } else {
        println!("No discrepancies found.");
    }
}
