/// One-time passcode issuance and verification
///
/// A code is tied to a registration, stored only as a SHA-256 digest,
/// valid for a short window and accepted at most once. Every verification
/// attempt counts against a fixed ceiling, and the ceiling is checked
/// before a correct code can succeed.
///
/// The attempt increment is a single conditional UPDATE so concurrent
/// verifications for the same registration cannot both slip under the
/// ceiling.

use crate::{
    config::OtpConfig,
    credentials,
    db::models::OtpRequest,
    error::{AppError, AppResult},
    metrics,
    registration::RegistrationStore,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Freshly issued code. The plaintext only ever lives here.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub otp_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// OTP manager
#[derive(Clone)]
pub struct OtpManager {
    db: SqlitePool,
    registrations: RegistrationStore,
    config: OtpConfig,
}

impl OtpManager {
    pub fn new(db: SqlitePool, config: OtpConfig) -> Self {
        let registrations = RegistrationStore::new(db.clone());
        Self {
            db,
            registrations,
            config,
        }
    }

    /// Issue a new code for a registration
    pub async fn issue(&self, registration_id: &str) -> AppResult<IssuedOtp> {
        // Fails with NotFound for unknown registrations
        self.registrations.get(registration_id).await?;

        let code = credentials::generate_code();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.ttl_secs);
        let otp_id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO otp_request (id, registration_id, code_hash, expires_at, attempts, is_used, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)
            "#,
        )
        .bind(&otp_id)
        .bind(registration_id)
        .bind(credentials::hash_code(&code))
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::from_db(e, "OTP request"))?;

        tracing::debug!(registration_id = %registration_id, otp_id = %otp_id, "otp issued");
        metrics::record_otp_issued();

        Ok(IssuedOtp {
            otp_id,
            code,
            expires_at,
        })
    }

    /// Issue a code only if the registration has no live one
    pub async fn send(&self, registration_id: &str) -> AppResult<IssuedOtp> {
        if let Some(latest) = self.latest(registration_id).await? {
            if !latest.is_used && Utc::now() <= latest.expires_at {
                return Err(AppError::Conflict(
                    "A verification code was already sent; use resend to request a new one"
                        .to_string(),
                ));
            }
        }

        self.issue(registration_id).await
    }

    /// Invalidate every outstanding code for the registration and issue a fresh one
    pub async fn resend(&self, registration_id: &str) -> AppResult<IssuedOtp> {
        self.registrations.get(registration_id).await?;

        let invalidated = sqlx::query(
            "UPDATE otp_request SET is_used = 1 WHERE registration_id = ?1 AND is_used = 0",
        )
        .bind(registration_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if invalidated > 0 {
            tracing::debug!(
                registration_id = %registration_id,
                invalidated,
                "outstanding otp requests invalidated"
            );
        }

        self.issue(registration_id).await
    }

    /// Most recently issued request for a registration
    pub async fn latest(&self, registration_id: &str) -> AppResult<Option<OtpRequest>> {
        let request = sqlx::query_as::<_, OtpRequest>(
            r#"
            SELECT * FROM otp_request
            WHERE registration_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(registration_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(request)
    }

    /// Verify a submitted code against the latest request
    pub async fn verify(&self, registration_id: &str, submitted_code: &str) -> AppResult<()> {
        let outcome = self.verify_inner(registration_id, submitted_code).await;

        let label = match &outcome {
            Ok(()) => "success",
            Err(AppError::OtpNotFound) => "not_found",
            Err(AppError::OtpExpired) => "expired",
            Err(AppError::OtpAlreadyUsed) => "already_used",
            Err(AppError::OtpAttemptsExceeded) => "attempts_exceeded",
            Err(AppError::OtpInvalidCode) => "invalid_code",
            Err(_) => "error",
        };
        metrics::record_otp_verification(label);
        tracing::info!(registration_id = %registration_id, outcome = label, "otp verification");

        outcome
    }

    async fn verify_inner(&self, registration_id: &str, submitted_code: &str) -> AppResult<()> {
        let request = self
            .latest(registration_id)
            .await?
            .ok_or(AppError::OtpNotFound)?;

        if Utc::now() > request.expires_at {
            return Err(AppError::OtpExpired);
        }

        if request.is_used {
            return Err(AppError::OtpAlreadyUsed);
        }

        if request.attempts >= self.config.max_attempts {
            return Err(AppError::OtpAttemptsExceeded);
        }

        // Count the attempt before comparing; losing the race to another
        // verifier at the ceiling shows up as no returned row.
        let attempts: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE otp_request
            SET attempts = attempts + 1
            WHERE id = ?1 AND attempts < ?2 AND is_used = 0
            RETURNING attempts
            "#,
        )
        .bind(&request.id)
        .bind(self.config.max_attempts)
        .fetch_optional(&self.db)
        .await?;

        if attempts.is_none() {
            return Err(AppError::OtpAttemptsExceeded);
        }

        if !credentials::verify_code(submitted_code.trim(), &request.code_hash) {
            return Err(AppError::OtpInvalidCode);
        }

        let consumed = sqlx::query("UPDATE otp_request SET is_used = 1 WHERE id = ?1 AND is_used = 0")
            .bind(&request.id)
            .execute(&self.db)
            .await?;

        if consumed.rows_affected() == 0 {
            return Err(AppError::OtpAlreadyUsed);
        }

        self.registrations
            .mark_contact_verified(&request.registration_id)
            .await?;

        Ok(())
    }

    /// Delete every OTP request (administrative purge)
    pub async fn purge_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM otp_request").execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}
