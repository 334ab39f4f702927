/// Events and registrant profiles
///
/// Registrations are anchored on an event and, outside guest flows,
/// on a profile. This module owns both tables.

use crate::{
    db::models::{Event, Profile},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Input for creating an event
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Input for creating a profile
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub full_name: String,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Event and profile manager
#[derive(Clone)]
pub struct EventManager {
    db: SqlitePool,
}

impl EventManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create an event
    pub async fn create_event(&self, new_event: NewEvent) -> AppResult<Event> {
        let title = new_event.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Event title is required".to_string()));
        }
        if let Some(ends_at) = new_event.ends_at {
            if ends_at < new_event.starts_at {
                return Err(AppError::Validation(
                    "Event cannot end before it starts".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4().to_string(),
            title,
            description: new_event.description,
            venue: new_event.venue,
            starts_at: new_event.starts_at,
            ends_at: new_event.ends_at,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO event (id, title, description, venue, starts_at, ends_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::from_db(e, "Event"))?;

        tracing::info!(event_id = %event.id, title = %event.title, "event created");

        Ok(event)
    }

    /// Get an event by id
    pub async fn get_event(&self, id: &str) -> AppResult<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM event WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event not found: {}", id)))
    }

    /// List events, soonest first
    pub async fn list_events(&self, limit: i64, offset: i64) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM event ORDER BY starts_at ASC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    /// Create a registrant profile
    pub async fn create_profile(&self, new_profile: NewProfile) -> AppResult<Profile> {
        let full_name = new_profile.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(AppError::Validation("Full name is required".to_string()));
        }

        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            full_name,
            contact_number: new_profile.contact_number,
            email: new_profile.email,
            address: new_profile.address,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO profile (id, full_name, contact_number, email, address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.contact_number)
        .bind(&profile.email)
        .bind(&profile.address)
        .bind(profile.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::from_db(e, "Profile"))?;

        Ok(profile)
    }

    /// Get a profile by id
    pub async fn get_profile(&self, id: &str) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profile WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile not found: {}", id)))
    }
}
