/// Registration persistence
use crate::{
    db::models::{Profile, Registration, RegistrationStatus},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Input for a new registration
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub event_id: String,
    pub profile_id: Option<String>,
    pub contact_number: Option<String>,
    pub custom_values: serde_json::Value,
    pub photo_path: Option<String>,
}

/// Registration joined with its profile for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
    #[serde(flatten)]
    pub registration: Registration,
    pub custom_values: serde_json::Value,
    pub profile: Option<Profile>,
    pub event_title: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Registration store
#[derive(Clone)]
pub struct RegistrationStore {
    db: SqlitePool,
}

impl RegistrationStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a PENDING registration
    pub async fn create(&self, new: NewRegistration) -> AppResult<Registration> {
        if !new.custom_values.is_object() {
            return Err(AppError::Validation(
                "customValues must be a JSON object".to_string(),
            ));
        }

        let now = Utc::now();
        let registration = Registration {
            id: Uuid::new_v4().to_string(),
            event_id: new.event_id,
            profile_id: new.profile_id,
            status: RegistrationStatus::Pending,
            photo_path: new.photo_path,
            custom_values: new.custom_values.to_string(),
            contact_number: new.contact_number,
            contact_verified_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO registration
                (id, event_id, profile_id, status, photo_path, custom_values, contact_number, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&registration.id)
        .bind(&registration.event_id)
        .bind(&registration.profile_id)
        .bind(registration.status)
        .bind(&registration.photo_path)
        .bind(&registration.custom_values)
        .bind(&registration.contact_number)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::from_db(e, "Registration"))?;

        tracing::info!(
            registration_id = %registration.id,
            event_id = %registration.event_id,
            "registration created"
        );

        Ok(registration)
    }

    /// Get a registration, if it exists
    pub async fn find(&self, id: &str) -> AppResult<Option<Registration>> {
        let registration =
            sqlx::query_as::<_, Registration>("SELECT * FROM registration WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(registration)
    }

    /// Get a registration by id
    pub async fn get(&self, id: &str) -> AppResult<Registration> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration not found: {}", id)))
    }

    /// Build the display view of a registration
    pub async fn details(&self, registration: Registration) -> AppResult<RegistrationDetails> {
        let profile = match &registration.profile_id {
            Some(profile_id) => {
                sqlx::query_as::<_, Profile>("SELECT * FROM profile WHERE id = ?1")
                    .bind(profile_id)
                    .fetch_optional(&self.db)
                    .await?
            }
            None => None,
        };

        let event_title: Option<String> =
            sqlx::query_scalar("SELECT title FROM event WHERE id = ?1")
                .bind(&registration.event_id)
                .fetch_optional(&self.db)
                .await?;

        let checked_in_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT checked_in_at FROM attendance WHERE registration_id = ?1",
        )
        .bind(&registration.id)
        .fetch_optional(&self.db)
        .await?;

        Ok(RegistrationDetails {
            custom_values: registration.custom_values_json(),
            registration,
            profile,
            event_title,
            checked_in_at,
        })
    }

    /// Get a registration joined with its profile
    pub async fn get_details(&self, id: &str) -> AppResult<RegistrationDetails> {
        let registration = self.get(id).await?;
        self.details(registration).await
    }

    /// List registrations for an event, optionally filtered by status
    pub async fn list_for_event(
        &self,
        event_id: &str,
        status: Option<RegistrationStatus>,
    ) -> AppResult<Vec<Registration>> {
        let registrations = match status {
            Some(status) => {
                sqlx::query_as::<_, Registration>(
                    "SELECT * FROM registration WHERE event_id = ?1 AND status = ?2 ORDER BY created_at ASC",
                )
                .bind(event_id)
                .bind(status)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Registration>(
                    "SELECT * FROM registration WHERE event_id = ?1 ORDER BY created_at ASC",
                )
                .bind(event_id)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(registrations)
    }

    /// Contact number for delivering codes: the registration's own number,
    /// falling back to the profile's
    pub async fn contact_number(&self, registration: &Registration) -> AppResult<Option<String>> {
        if registration.contact_number.is_some() {
            return Ok(registration.contact_number.clone());
        }

        let Some(profile_id) = &registration.profile_id else {
            return Ok(None);
        };

        let number: Option<Option<String>> =
            sqlx::query_scalar("SELECT contact_number FROM profile WHERE id = ?1")
                .bind(profile_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(number.flatten())
    }

    /// Record that the registrant proved control of their contact number
    pub async fn mark_contact_verified(&self, id: &str) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE registration SET contact_verified_at = ?1, updated_at = ?1 WHERE id = ?2",
        )
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Refresh the update timestamp
    pub async fn touch(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE registration SET updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Registration not found: {}", id)));
        }

        Ok(())
    }
}
