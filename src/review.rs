use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{ReconError, Result};
use crate::models::{DiscrepancyStatus, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(&self) -> DiscrepancyStatus {
        match self {
            Decision::Approve => DiscrepancyStatus::Approved,
            Decision::Reject => DiscrepancyStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = ReconError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(ReconError::InvalidInput(format!(
                "decision must be approve or reject, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub discrepancy_id: Uuid,
    pub status: DiscrepancyStatus,
    pub manager_notes: Option<String>,
    pub resolved_by: Uuid,
    pub resolved_at: DateTime<Utc>,
}

/// Applies a manager decision to a discrepancy in `current` state.
///
/// Only `pending` discrepancies can move, and only to `approved` or `rejected`.
pub fn transition(
    id: Uuid,
    current: DiscrepancyStatus,
    actor: Identity,
    decision: Decision,
    notes: Option<String>,
    at: DateTime<Utc>,
) -> Result<Resolution> {
    if !actor.role.is_manager() {
        return Err(ReconError::Forbidden(actor.user_id));
    }
    if current != DiscrepancyStatus::Pending {
        return Err(ReconError::AlreadyResolved {
            id,
            status: current.as_str().to_string(),
        });
    }

    Ok(Resolution {
        discrepancy_id: id,
        status: decision.target(),
        manager_notes: notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        resolved_by: actor.user_id,
        resolved_at: at,
    })
}

pub async fn resolve(
    pool: &PgPool,
    actor: Identity,
    id: Uuid,
    decision: Decision,
    notes: Option<String>,
) -> Result<Resolution> {
    let current = db::fetch_discrepancy_status(pool, id)
        .await?
        .ok_or_else(|| ReconError::NotFound {
            kind: "discrepancy",
            id: id.to_string(),
        })?;

    let resolution = transition(id, current, actor, decision, notes, Utc::now())?;

    // A concurrent reviewer may have resolved it between the read and the write.
    if !db::apply_resolution(pool, &resolution).await? {
        let latest = db::fetch_discrepancy_status(pool, id)
            .await?
            .unwrap_or(DiscrepancyStatus::Pending);
        return Err(ReconError::AlreadyResolved {
            id,
            status: latest.as_str().to_string(),
        });
    }

    tracing::info!(
        discrepancy = %id,
        status = resolution.status.as_str(),
        resolved_by = %actor.user_id,
        "discrepancy resolved"
    );
    Ok(resolution)
}
