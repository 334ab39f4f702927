/// Approval workflow and check-in
use crate::{
    db::models::{Attendance, Registration, RegistrationStatus},
    error::{AppError, AppResult},
    metrics,
    registration::RegistrationStore,
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Staff decision on a pending registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    /// Parse the decision literal. Only the exact lowercase words are accepted.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "approved" => Ok(ApprovalDecision::Approved),
            "rejected" => Ok(ApprovalDecision::Rejected),
            other => Err(AppError::InvalidStatus(format!(
                "'{}' is not one of: approved, rejected",
                other
            ))),
        }
    }

    pub fn status(&self) -> RegistrationStatus {
        match self {
            ApprovalDecision::Approved => RegistrationStatus::Approved,
            ApprovalDecision::Rejected => RegistrationStatus::Rejected,
        }
    }
}

/// Moves registrations out of PENDING and records check-ins
#[derive(Clone)]
pub struct ApprovalWorkflow {
    db: SqlitePool,
    registrations: RegistrationStore,
}

impl ApprovalWorkflow {
    pub fn new(db: SqlitePool) -> Self {
        let registrations = RegistrationStore::new(db.clone());
        Self { db, registrations }
    }

    /// Approve or reject a pending registration
    pub async fn decide(&self, registration_id: &str, decision: &str) -> AppResult<Registration> {
        let decision = ApprovalDecision::parse(decision)?;
        let status = decision.status();

        let result = sqlx::query(
            r#"
            UPDATE registration
            SET status = ?1, updated_at = ?2
            WHERE id = ?3 AND status = 'PENDING'
            "#,
        )
        .bind(status)
        .bind(Utc::now())
        .bind(registration_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let existing = self.registrations.get(registration_id).await?;
            return Err(AppError::Conflict(format!(
                "Registration is already {}",
                existing.status.as_str()
            )));
        }

        tracing::info!(
            registration_id = %registration_id,
            status = status.as_str(),
            "registration decided"
        );
        metrics::record_approval_decision(status.as_str());

        self.registrations.get(registration_id).await
    }

    /// Record that an approved registrant arrived
    pub async fn check_in(
        &self,
        registration_id: &str,
        checked_in_by: Option<&str>,
    ) -> AppResult<Attendance> {
        let registration = self.registrations.get(registration_id).await?;
        if registration.status != RegistrationStatus::Approved {
            return Err(AppError::Validation(format!(
                "Registration is {}, only APPROVED registrations can check in",
                registration.status.as_str()
            )));
        }

        let attendance = Attendance {
            id: Uuid::new_v4().to_string(),
            registration_id: registration.id.clone(),
            checked_in_by: checked_in_by.map(String::from),
            checked_in_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO attendance (id, registration_id, checked_in_by, checked_in_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&attendance.id)
        .bind(&attendance.registration_id)
        .bind(&attendance.checked_in_by)
        .bind(attendance.checked_in_at)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::from_db(e, "Check-in for this registration"))?;

        self.registrations.touch(&registration.id).await?;

        tracing::info!(registration_id = %registration.id, "registrant checked in");

        Ok(attendance)
    }
}
