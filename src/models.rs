use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ReconError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Recruiter,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Recruiter => "recruiter",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Managers and admins resolve discrepancies and receive summaries.
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recruiter" => Ok(Role::Recruiter),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(ReconError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// The acting user for a single service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl From<&Profile> for Identity {
    fn from(profile: &Profile) -> Self {
        Identity {
            user_id: profile.id,
            role: profile.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    InterviewsScheduled,
    OffersSent,
    HiresMade,
    CandidatesContacted,
}

impl MetricField {
    pub const ALL: [MetricField; 4] = [
        MetricField::InterviewsScheduled,
        MetricField::OffersSent,
        MetricField::HiresMade,
        MetricField::CandidatesContacted,
    ];

    /// Column name, also stored as the discrepancy `field_name`.
    pub fn column(&self) -> &'static str {
        match self {
            MetricField::InterviewsScheduled => "interviews_scheduled",
            MetricField::OffersSent => "offers_sent",
            MetricField::HiresMade => "hires_made",
            MetricField::CandidatesContacted => "candidates_contacted",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricField::InterviewsScheduled => "Interviews",
            MetricField::OffersSent => "Offers",
            MetricField::HiresMade => "Hires",
            MetricField::CandidatesContacted => "Contacts",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for MetricField {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricField::ALL
            .into_iter()
            .find(|field| field.column() == value)
            .ok_or_else(|| ReconError::InvalidInput(format!("unknown metric field '{value}'")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub interviews_scheduled: i32,
    pub offers_sent: i32,
    pub hires_made: i32,
    pub candidates_contacted: i32,
}

impl Metrics {
    pub fn get(&self, field: MetricField) -> i32 {
        match field {
            MetricField::InterviewsScheduled => self.interviews_scheduled,
            MetricField::OffersSent => self.offers_sent,
            MetricField::HiresMade => self.hires_made,
            MetricField::CandidatesContacted => self.candidates_contacted,
        }
    }

    pub fn set(&mut self, field: MetricField, value: i32) {
        match field {
            MetricField::InterviewsScheduled => self.interviews_scheduled = value,
            MetricField::OffersSent => self.offers_sent = value,
            MetricField::HiresMade => self.hires_made = value,
            MetricField::CandidatesContacted => self.candidates_contacted = value,
        }
    }

    pub fn ensure_non_negative(&self) -> Result<(), ReconError> {
        match MetricField::ALL.into_iter().find(|field| self.get(*field) < 0) {
            Some(field) => Err(ReconError::InvalidInput(format!("{field} cannot be negative"))),
            None => Ok(()),
        }
    }

    /// Adds `other` field by field, saturating at `i32::MAX`.
    pub fn add(&mut self, other: &Metrics) {
        for field in MetricField::ALL {
            self.set(field, self.get(field).saturating_add(other.get(field)));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Error)
    }
}

impl FromStr for ReportStatus {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ReportStatus::Pending),
            "processing" => Ok(ReportStatus::Processing),
            "completed" => Ok(ReportStatus::Completed),
            "error" => Ok(ReportStatus::Error),
            other => Err(ReconError::InvalidInput(format!("unknown report status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductionReport {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub report_date: NaiveDate,
    pub status: ReportStatus,
    pub total_records: i32,
    pub discrepancies_found: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One named employee row extracted from a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub employee_name: String,
    pub employee_email: String,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    pub user_id: Uuid,
    pub activity_date: NaiveDate,
    pub metrics: Metrics,
    pub notes: Option<String>,
}

/// An activity log joined with the profile of the user who wrote it.
#[derive(Debug, Clone)]
pub struct LoggedActivity {
    pub log: ActivityLog,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyStatus {
    Pending,
    Approved,
    Rejected,
}

impl DiscrepancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyStatus::Pending => "pending",
            DiscrepancyStatus::Approved => "approved",
            DiscrepancyStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for DiscrepancyStatus {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(DiscrepancyStatus::Pending),
            "approved" => Ok(DiscrepancyStatus::Approved),
            "rejected" => Ok(DiscrepancyStatus::Rejected),
            other => Err(ReconError::InvalidInput(format!(
                "unknown discrepancy status '{other}'"
            ))),
        }
    }
}

/// A discrepancy as produced by the reconciler, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiscrepancy {
    pub user_id: Uuid,
    pub field: MetricField,
    pub reported_value: i32,
    pub logged_value: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityDiscrepancy {
    pub id: Uuid,
    pub report_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub report_date: NaiveDate,
    pub field: MetricField,
    pub reported_value: i32,
    pub logged_value: i32,
    pub status: DiscrepancyStatus,
    pub manager_notes: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UserTotals {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub days_logged: usize,
    pub totals: Metrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_fields_round_trip_through_column_names() {
        for field in MetricField::ALL {
            assert_eq!(field.column().parse::<MetricField>().unwrap(), field);
        }
        assert!("hires".parse::<MetricField>().is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let mut metrics = Metrics::default();
        assert!(metrics.ensure_non_negative().is_ok());
        metrics.set(MetricField::OffersSent, -1);
        let err = metrics.ensure_non_negative().unwrap_err();
        assert!(err.to_string().contains("offers_sent"));
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let mut team = Metrics::default();
        let mut large = Metrics::default();
        large.set(MetricField::HiresMade, i32::MAX);
        let mut one = Metrics::default();
        one.set(MetricField::HiresMade, 1);
        one.set(MetricField::OffersSent, 2);

        team.add(&large);
        team.add(&one);
        assert_eq!(team.hires_made, i32::MAX);
        assert_eq!(team.offers_sent, 2);
    }

    #[test]
    fn only_managers_and_admins_review() {
        assert!(!"recruiter".parse::<Role>().unwrap().is_manager());
        assert!(" Manager ".parse::<Role>().unwrap().is_manager());
        assert!("admin".parse::<Role>().unwrap().is_manager());
        assert!("intern".parse::<Role>().is_err());
    }
}
