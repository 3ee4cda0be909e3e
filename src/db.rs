use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{ReconError, Result};
use crate::models::{
    ActivityDiscrepancy, ActivityLog, DiscrepancyStatus, LoggedActivity, Metrics,
    NewDiscrepancy, ProductionReport, Profile, ReportRow, ReportStatus,
};
use crate::review::Resolution;
use crate::watch::Snapshot;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let profiles = vec![
        (
            Uuid::parse_str("6b1f0a52-8f0e-4d0b-9c3e-1f2a3b4c5d6e")?,
            "Morgan Blake",
            "morgan.blake@company.com",
            "manager",
        ),
        (
            Uuid::parse_str("2a9d7c41-5e3b-4f8a-b1c2-d3e4f5a6b7c8")?,
            "Jane Doe",
            "jane.doe@company.com",
            "recruiter",
        ),
        (
            Uuid::parse_str("9e8d7c6b-5a49-4382-a1b0-c9d8e7f6a5b4")?,
            "Sam Park",
            "sam.park@company.com",
            "recruiter",
        ),
        (
            Uuid::parse_str("4c3b2a19-0f8e-4d7c-9b6a-5f4e3d2c1b0a")?,
            "Priya Natarajan",
            "priya.n@company.com",
            "recruiter",
        ),
    ];

    for (id, name, email, role) in profiles {
        sqlx::query(
            r#"
            INSERT INTO production_recon.profiles (id, full_name, email, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, role = EXCLUDED.role
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role)
        .execute(pool)
        .await?;
    }

    let day = NaiveDate::from_ymd_opt(2026, 3, 2).ok_or_else(|| anyhow::anyhow!("invalid date"))?;
    let logs = vec![
        ("jane.doe@company.com", 5, 2, 0, 38, "Two onsite loops booked"),
        ("sam.park@company.com", 3, 1, 1, 25, "Closed the warehouse lead"),
        ("priya.n@company.com", 4, 0, 0, 52, "Sourcing day"),
    ];

    for (email, interviews, offers, hires, contacts, note) in logs {
        let profile = find_profile_by_email(pool, email)
            .await?
            .ok_or_else(|| anyhow::anyhow!("seed profile {email} missing"))?;
        upsert_activity_log(
            pool,
            &ActivityLog {
                user_id: profile.id,
                activity_date: day,
                metrics: Metrics {
                    interviews_scheduled: interviews,
                    offers_sent: offers,
                    hires_made: hires,
                    candidates_contacted: contacts,
                },
                notes: Some(note.to_string()),
            },
        )
        .await?;
    }

    Ok(())
}

fn profile_from_row(row: &PgRow) -> Result<Profile> {
    let role: String = row.try_get("role")?;
    Ok(Profile {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        role: role.parse()?,
    })
}

fn metrics_from_row(row: &PgRow) -> Result<Metrics> {
    Ok(Metrics {
        interviews_scheduled: row.try_get("interviews_scheduled")?,
        offers_sent: row.try_get("offers_sent")?,
        hires_made: row.try_get("hires_made")?,
        candidates_contacted: row.try_get("candidates_contacted")?,
    })
}

fn report_from_row(row: &PgRow) -> Result<ProductionReport> {
    let status: String = row.try_get("status")?;
    Ok(ProductionReport {
        id: row.try_get("id")?,
        uploaded_by: row.try_get("uploaded_by")?,
        file_name: row.try_get("file_name")?,
        file_url: row.try_get("file_url")?,
        report_date: row.try_get("report_date")?,
        status: status.parse()?,
        total_records: row.try_get("total_records")?,
        discrepancies_found: row.try_get("discrepancies_found")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
    })
}

fn logged_activity_from_row(row: &PgRow) -> Result<LoggedActivity> {
    Ok(LoggedActivity {
        log: ActivityLog {
            user_id: row.try_get("user_id")?,
            activity_date: row.try_get("activity_date")?,
            metrics: metrics_from_row(row)?,
            notes: row.try_get("notes")?,
        },
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
    })
}

fn discrepancy_from_row(row: &PgRow) -> Result<ActivityDiscrepancy> {
    let field: String = row.try_get("field_name")?;
    let status: String = row.try_get("status")?;
    Ok(ActivityDiscrepancy {
        id: row.try_get("id")?,
        report_id: row.try_get("report_id")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("full_name")?,
        report_date: row.try_get("report_date")?,
        field: field.parse()?,
        reported_value: row.try_get("reported_value")?,
        logged_value: row.try_get("logged_value")?,
        status: status.parse()?,
        manager_notes: row.try_get("manager_notes")?,
        resolved_by: row.try_get("resolved_by")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

pub async fn find_profile_by_email(pool: &PgPool, email: &str) -> Result<Option<Profile>> {
    let row = sqlx::query(
        "SELECT id, full_name, email, role FROM production_recon.profiles WHERE lower(email) = lower($1)",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(profile_from_row).transpose()
}

pub async fn fetch_managers(pool: &PgPool) -> Result<Vec<Profile>> {
    let rows = sqlx::query(
        "SELECT id, full_name, email, role FROM production_recon.profiles \
         WHERE role IN ('manager', 'admin') ORDER BY email",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(profile_from_row).collect()
}

/// Last write wins for a given (user, date).
pub async fn upsert_activity_log(pool: &PgPool, log: &ActivityLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO production_recon.activity_logs
        (id, user_id, activity_date, interviews_scheduled, offers_sent, hires_made,
         candidates_contacted, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, activity_date) DO UPDATE
        SET interviews_scheduled = EXCLUDED.interviews_scheduled,
            offers_sent = EXCLUDED.offers_sent,
            hires_made = EXCLUDED.hires_made,
            candidates_contacted = EXCLUDED.candidates_contacted,
            notes = EXCLUDED.notes,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(log.user_id)
    .bind(log.activity_date)
    .bind(log.metrics.interviews_scheduled)
    .bind(log.metrics.offers_sent)
    .bind(log.metrics.hires_made)
    .bind(log.metrics.candidates_contacted)
    .bind(&log.notes)
    .execute(pool)
    .await?;
    Ok(())
}

const LOGGED_ACTIVITY_SELECT: &str = "SELECT l.user_id, l.activity_date, l.interviews_scheduled, \
     l.offers_sent, l.hires_made, l.candidates_contacted, l.notes, p.full_name, p.email \
     FROM production_recon.activity_logs l \
     JOIN production_recon.profiles p ON p.id = l.user_id";

pub async fn fetch_logged_activity(pool: &PgPool, date: NaiveDate) -> Result<Vec<LoggedActivity>> {
    let query = format!("{LOGGED_ACTIVITY_SELECT} WHERE l.activity_date = $1 ORDER BY p.email");
    let rows = sqlx::query(&query).bind(date).fetch_all(pool).await?;
    rows.iter().map(logged_activity_from_row).collect()
}

pub async fn fetch_activity_window(
    pool: &PgPool,
    since_date: NaiveDate,
    user_id: Option<Uuid>,
) -> Result<Vec<LoggedActivity>> {
    let mut query = format!("{LOGGED_ACTIVITY_SELECT} WHERE l.activity_date >= $1");
    if user_id.is_some() {
        query.push_str(" AND l.user_id = $2");
    }
    query.push_str(" ORDER BY l.activity_date, p.email");

    let mut rows = sqlx::query(&query).bind(since_date);
    if let Some(id) = user_id {
        rows = rows.bind(id);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(logged_activity_from_row).collect()
}

pub async fn fetch_activity_log(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Option<LoggedActivity>> {
    let query = format!("{LOGGED_ACTIVITY_SELECT} WHERE l.user_id = $1 AND l.activity_date = $2");
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(logged_activity_from_row).transpose()
}

pub async fn insert_report(pool: &PgPool, report: &ProductionReport) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO production_recon.production_reports
        (id, uploaded_by, file_name, file_url, report_date, status, total_records,
         discrepancies_found, error_message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(report.id)
    .bind(report.uploaded_by)
    .bind(&report.file_name)
    .bind(&report.file_url)
    .bind(report.report_date)
    .bind(report.status.as_str())
    .bind(report.total_records)
    .bind(report.discrepancies_found)
    .bind(&report.error_message)
    .bind(report.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_report_status(
    pool: &PgPool,
    id: Uuid,
    status: ReportStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE production_recon.production_reports \
         SET status = $2, error_message = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn complete_report(
    pool: &PgPool,
    id: Uuid,
    total_records: i32,
    discrepancies_found: i32,
) -> Result<()> {
    sqlx::query(
        "UPDATE production_recon.production_reports \
         SET status = 'completed', total_records = $2, discrepancies_found = $3, \
         error_message = NULL WHERE id = $1",
    )
    .bind(id)
    .bind(total_records)
    .bind(discrepancies_found)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replaces a report's entries and inserts its discrepancies in one
/// transaction. Returns the entry count and how many discrepancies were new;
/// existing (report, user, field) rows are left untouched.
pub async fn replace_report_results(
    pool: &PgPool,
    report_id: Uuid,
    report_date: NaiveDate,
    rows: &[ReportRow],
    discrepancies: &[NewDiscrepancy],
) -> Result<(usize, usize)> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM production_recon.production_report_entries WHERE report_id = $1")
        .bind(report_id)
        .execute(&mut *tx)
        .await?;

    for (position, row) in rows.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO production_recon.production_report_entries
            (id, report_id, position, employee_name, employee_email,
             interviews_scheduled, offers_sent, hires_made, candidates_contacted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report_id)
        .bind(position as i32)
        .bind(&row.employee_name)
        .bind(&row.employee_email)
        .bind(row.metrics.interviews_scheduled)
        .bind(row.metrics.offers_sent)
        .bind(row.metrics.hires_made)
        .bind(row.metrics.candidates_contacted)
        .execute(&mut *tx)
        .await?;
    }

    let mut inserted = 0usize;
    for discrepancy in discrepancies {
        let result = sqlx::query(
            r#"
            INSERT INTO production_recon.activity_discrepancies
            (id, report_id, user_id, report_date, field_name, reported_value, logged_value, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            ON CONFLICT (report_id, user_id, field_name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report_id)
        .bind(discrepancy.user_id)
        .bind(report_date)
        .bind(discrepancy.field.column())
        .bind(discrepancy.reported_value)
        .bind(discrepancy.logged_value)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok((rows.len(), inserted))
}

pub async fn count_report_discrepancies(pool: &PgPool, report_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS total FROM production_recon.activity_discrepancies WHERE report_id = $1",
    )
    .bind(report_id)
    .fetch_one(pool)
    .await?
    .try_get("total")?;
    Ok(count)
}

const REPORT_SELECT: &str = "SELECT id, uploaded_by, file_name, file_url, report_date, status, \
     total_records, discrepancies_found, error_message, created_at \
     FROM production_recon.production_reports";

pub async fn fetch_report(pool: &PgPool, id: Uuid) -> Result<ProductionReport> {
    let query = format!("{REPORT_SELECT} WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ReconError::NotFound {
            kind: "report",
            id: id.to_string(),
        })?;
    report_from_row(&row)
}

pub async fn fetch_reports(pool: &PgPool, limit: i64) -> Result<Vec<ProductionReport>> {
    let query = format!("{REPORT_SELECT} ORDER BY created_at DESC LIMIT $1");
    let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;
    rows.iter().map(report_from_row).collect()
}

/// Most recently uploaded completed report dated within `[from, to]`.
pub async fn fetch_latest_report(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Option<ProductionReport>> {
    let query = format!(
        "{REPORT_SELECT} WHERE status = 'completed' AND report_date BETWEEN $1 AND $2 \
         ORDER BY report_date DESC, created_at DESC LIMIT 1"
    );
    let row = sqlx::query(&query)
        .bind(from)
        .bind(to)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(report_from_row).transpose()
}

pub async fn fetch_report_entries(
    pool: &PgPool,
    report_id: Uuid,
) -> Result<Vec<ReportRow>> {
    let rows = sqlx::query(
        r#"
        SELECT employee_name, employee_email, interviews_scheduled, offers_sent,
               hires_made, candidates_contacted
        FROM production_recon.production_report_entries
        WHERE report_id = $1
        ORDER BY position
        "#,
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ReportRow {
                employee_name: row.try_get("employee_name")?,
                employee_email: row.try_get("employee_email")?,
                metrics: metrics_from_row(row)?,
            })
        })
        .collect()
}

pub async fn fetch_discrepancies(
    pool: &PgPool,
    status: Option<DiscrepancyStatus>,
    report_id: Option<Uuid>,
) -> Result<Vec<ActivityDiscrepancy>> {
    let mut query = String::from(
        "SELECT d.id, d.report_id, d.user_id, p.full_name, d.report_date, d.field_name, \
         d.reported_value, d.logged_value, d.status, d.manager_notes, d.resolved_by, d.resolved_at \
         FROM production_recon.activity_discrepancies d \
         JOIN production_recon.profiles p ON p.id = d.user_id \
         WHERE ($1::text IS NULL OR d.status = $1) \
         AND ($2::uuid IS NULL OR d.report_id = $2)",
    );
    query.push_str(" ORDER BY d.report_date DESC, p.full_name, d.field_name");

    let rows = sqlx::query(&query)
        .bind(status.map(|s| s.as_str()))
        .bind(report_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(discrepancy_from_row).collect()
}

pub async fn fetch_discrepancy_status(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<DiscrepancyStatus>> {
    let row = sqlx::query("SELECT status FROM production_recon.activity_discrepancies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let status: String = row.try_get("status")?;
            Ok(Some(status.parse()?))
        }
        None => Ok(None),
    }
}

/// Writes a resolution only if the discrepancy is still pending.
pub async fn apply_resolution(pool: &PgPool, resolution: &Resolution) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE production_recon.activity_discrepancies
        SET status = $2, manager_notes = $3, resolved_by = $4, resolved_at = $5
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(resolution.discrepancy_id)
    .bind(resolution.status.as_str())
    .bind(&resolution.manager_notes)
    .bind(resolution.resolved_by)
    .bind(resolution.resolved_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn fetch_snapshot(pool: &PgPool) -> Result<Snapshot> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM production_recon.production_reports) AS reports,
            (SELECT COUNT(*) FROM production_recon.production_reports
              WHERE status = 'processing') AS processing,
            (SELECT COUNT(*) FROM production_recon.activity_discrepancies
              WHERE status = 'pending') AS pending,
            (SELECT COUNT(*) FROM production_recon.activity_discrepancies
              WHERE status <> 'pending') AS resolved,
            (SELECT COUNT(*) FROM production_recon.activity_logs) AS activity_logs
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Snapshot {
        reports: row.try_get("reports")?,
        processing_reports: row.try_get("processing")?,
        pending_discrepancies: row.try_get("pending")?,
        resolved_discrepancies: row.try_get("resolved")?,
        activity_logs: row.try_get("activity_logs")?,
    })
}
