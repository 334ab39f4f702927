/// QR credential issuance, scanning and download
///
/// A credential is an opaque UUID code value bound to one registration.
/// The rendered image encodes a small JSON payload; scanners may submit
/// either that payload or the bare code value.

use crate::{
    config::QrConfig,
    db::models::QrCode,
    error::{AppError, AppResult},
    metrics,
    registration::{RegistrationDetails, RegistrationStore},
    storage::UploadStore,
};
use chrono::{DateTime, Duration, Utc};
use image::{DynamicImage, ImageFormat, Luma};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

pub const QR_CONTENT_TYPE: &str = "image/png";

/// Data encoded into the QR image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub registration_id: String,
    pub code_value: String,
    /// Epoch milliseconds
    pub issued_at: i64,
}

/// Outcome of a successful scan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub registration: RegistrationDetails,
    pub qr: QrCode,
}

/// Extract the code value from whatever the scanner read
fn scanned_code_value(scanned: &str) -> String {
    let trimmed = scanned.trim();
    if trimmed.starts_with('{') {
        if let Ok(payload) = serde_json::from_str::<QrPayload>(trimmed) {
            return payload.code_value;
        }
    }
    trimmed.to_string()
}

/// A credential stays valid through its expiry instant
fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

/// Render a payload into PNG bytes
fn render_png(payload: &str) -> AppResult<Vec<u8>> {
    let code = qrcode::QrCode::new(payload.as_bytes())
        .map_err(|e| AppError::Internal(format!("Failed to encode QR payload: {}", e)))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(256, 256)
        .build();

    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    DynamicImage::ImageLuma8(image)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to write QR image: {}", e)))?;

    Ok(buf)
}

/// QR credential issuer
#[derive(Clone)]
pub struct QrIssuer {
    db: SqlitePool,
    registrations: RegistrationStore,
    uploads: UploadStore,
    validity: Duration,
}

impl QrIssuer {
    pub fn new(db: SqlitePool, uploads: UploadStore, config: &QrConfig) -> Self {
        let registrations = RegistrationStore::new(db.clone());
        Self {
            db,
            registrations,
            uploads,
            validity: Duration::days(config.validity_days),
        }
    }

    /// Issue a fresh credential, expiring any earlier ones for the same registration
    pub async fn issue(&self, registration_id: Option<&str>) -> AppResult<QrCode> {
        let registration_id = registration_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("registrationId is required".to_string()))?;

        let registration = self.registrations.get(registration_id).await?;

        let now = Utc::now();
        let code_value = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&QrPayload {
            registration_id: registration.id.clone(),
            code_value: code_value.clone(),
            issued_at: now.timestamp_millis(),
        })
        .map_err(|e| AppError::Internal(format!("Failed to serialize QR payload: {}", e)))?;

        let png = render_png(&payload)?;
        let image_path = self.uploads.write_qr_image(&code_value, &png).await?;

        let qr = QrCode {
            id: Uuid::new_v4().to_string(),
            registration_id: registration.id,
            code_value,
            image_path,
            expires_at: now + self.validity,
            created_at: now,
        };

        // The new row and the expiry of earlier ones commit together.
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO qr_code (id, registration_id, code_value, image_path, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&qr.id)
        .bind(&qr.registration_id)
        .bind(&qr.code_value)
        .bind(&qr.image_path)
        .bind(qr.expires_at)
        .bind(qr.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_db(e, "QR code"))?;

        sqlx::query(
            r#"
            UPDATE qr_code SET expires_at = ?1
            WHERE registration_id = ?2 AND id != ?3
            "#,
        )
        .bind(now)
        .bind(&qr.registration_id)
        .bind(&qr.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            registration_id = %qr.registration_id,
            qr_id = %qr.id,
            "QR credential issued"
        );
        metrics::record_qr_issued();

        Ok(qr)
    }

    /// Look up the registration behind a scanned value. Does not record attendance.
    pub async fn resolve(&self, scanned: &str) -> AppResult<ScanResult> {
        let result = self.resolve_inner(scanned).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AppError::QrNotRecognized) => "not_recognized",
            Err(AppError::QrExpired) => "expired",
            Err(AppError::RegistrationMissing) => "registration_missing",
            Err(_) => "error",
        };
        metrics::record_qr_scan(outcome);

        result
    }

    async fn resolve_inner(&self, scanned: &str) -> AppResult<ScanResult> {
        let code_value = scanned_code_value(scanned);
        if code_value.is_empty() {
            return Err(AppError::QrNotRecognized);
        }

        let qr = self
            .find_by_code(&code_value)
            .await?
            .ok_or(AppError::QrNotRecognized)?;

        if is_expired(qr.expires_at, Utc::now()) {
            return Err(AppError::QrExpired);
        }

        let registration = self
            .registrations
            .find(&qr.registration_id)
            .await?
            .ok_or(AppError::RegistrationMissing)?;
        let registration = self.registrations.details(registration).await?;

        Ok(ScanResult { registration, qr })
    }

    async fn find_by_code(&self, code_value: &str) -> AppResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_code WHERE code_value = ?1")
            .bind(code_value)
            .fetch_optional(&self.db)
            .await?;
        Ok(qr)
    }

    pub async fn get(&self, qr_id: &str) -> AppResult<QrCode> {
        sqlx::query_as::<_, QrCode>("SELECT * FROM qr_code WHERE id = ?1")
            .bind(qr_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("QR code {} not found", qr_id)))
    }

    /// Rendered image bytes and content type
    pub async fn download(&self, qr_id: &str) -> AppResult<(Vec<u8>, &'static str)> {
        let qr = self.get(qr_id).await?;

        let bytes = self
            .uploads
            .read(&qr.image_path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("QR image for {} not found", qr_id)))?;

        Ok((bytes, QR_CONTENT_TYPE))
    }

    /// Delete every QR row. Image files stay on disk.
    pub async fn purge_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM qr_code").execute(&self.db).await?;
        tracing::warn!(deleted = result.rows_affected(), "all QR codes purged");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ServerConfig, test_support};
    use tempfile::TempDir;

    async fn setup() -> (QrIssuer, SqlitePool, String, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_tests(dir.path());
        let pool = crate::db::test_pool().await;
        let event = test_support::seed_event(&pool).await;
        let registration = test_support::seed_registration(&pool, &event.id).await;
        let issuer = QrIssuer::new(pool.clone(), UploadStore::new(&config.uploads), &config.qr);
        (issuer, pool, registration.id, dir)
    }

    #[test]
    fn test_scanned_code_value_accepts_payload_or_bare_code() {
        assert_eq!(scanned_code_value("  abc-123 "), "abc-123");

        let payload = r#"{"registrationId":"r1","codeValue":"abc-123","issuedAt":1700000000000}"#;
        assert_eq!(scanned_code_value(payload), "abc-123");
    }

    #[tokio::test]
    async fn test_issue_requires_registration_id() {
        let (issuer, _pool, _id, _dir) = setup().await;

        assert!(matches!(issuer.issue(None).await, Err(AppError::BadRequest(_))));
        assert!(matches!(
            issuer.issue(Some("missing")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_issue_then_resolve_roundtrip() {
        let (issuer, _pool, registration_id, _dir) = setup().await;

        let qr = issuer.issue(Some(&registration_id)).await.unwrap();
        assert_eq!(qr.image_path, format!("qrcodes/qr-{}.png", qr.code_value));
        assert!(qr.expires_at > Utc::now() + Duration::days(29));

        let scan = issuer.resolve(&qr.code_value).await.unwrap();
        assert_eq!(scan.registration.registration.id, registration_id);
        assert_eq!(scan.qr.id, qr.id);

        let payload = serde_json::to_string(&QrPayload {
            registration_id: registration_id.clone(),
            code_value: qr.code_value.clone(),
            issued_at: qr.created_at.timestamp_millis(),
        })
        .unwrap();
        let scan = issuer.resolve(&payload).await.unwrap();
        assert_eq!(scan.registration.registration.id, registration_id);
    }

    #[tokio::test]
    async fn test_resolve_unknown_code() {
        let (issuer, _pool, _id, _dir) = setup().await;

        assert!(matches!(
            issuer.resolve("no-such-code").await,
            Err(AppError::QrNotRecognized)
        ));
        assert!(matches!(issuer.resolve("   ").await, Err(AppError::QrNotRecognized)));
    }

    #[tokio::test]
    async fn test_resolve_expired_code() {
        let (issuer, pool, registration_id, _dir) = setup().await;
        let qr = issuer.issue(Some(&registration_id)).await.unwrap();

        sqlx::query("UPDATE qr_code SET expires_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(&qr.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            issuer.resolve(&qr.code_value).await,
            Err(AppError::QrExpired)
        ));
    }

    #[tokio::test]
    async fn test_reissue_expires_previous_code() {
        let (issuer, _pool, registration_id, _dir) = setup().await;

        let first = issuer.issue(Some(&registration_id)).await.unwrap();
        let second = issuer.issue(Some(&registration_id)).await.unwrap();
        assert_ne!(first.code_value, second.code_value);

        assert!(matches!(
            issuer.resolve(&first.code_value).await,
            Err(AppError::QrExpired)
        ));
        assert!(issuer.resolve(&second.code_value).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_reissue_keeps_previous_code() {
        let (issuer, pool, registration_id, _dir) = setup().await;
        let first = issuer.issue(Some(&registration_id)).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_qr BEFORE INSERT ON qr_code BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert!(issuer.issue(Some(&registration_id)).await.is_err());

        let scan = issuer.resolve(&first.code_value).await.unwrap();
        assert_eq!(scan.qr.id, first.id);
    }

    #[test]
    fn test_expiry_boundary() {
        let expires_at = Utc::now();
        assert!(!is_expired(expires_at, expires_at));
        assert!(is_expired(expires_at, expires_at + Duration::milliseconds(1)));
        assert!(!is_expired(expires_at, expires_at - Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_download_missing_file_is_not_found() {
        let (issuer, _pool, registration_id, dir) = setup().await;
        let qr = issuer.issue(Some(&registration_id)).await.unwrap();

        std::fs::remove_file(dir.path().join(&qr.image_path)).unwrap();

        assert!(issuer.get(&qr.id).await.is_ok());
        assert!(matches!(
            issuer.download(&qr.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_returns_png() {
        let (issuer, _pool, registration_id, _dir) = setup().await;
        let qr = issuer.issue(Some(&registration_id)).await.unwrap();

        let (bytes, content_type) = issuer.download(&qr.id).await.unwrap();
        assert_eq!(content_type, "image/png");
        assert!(!bytes.is_empty());
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

        assert!(matches!(
            issuer.download("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_all_keeps_files() {
        let (issuer, _pool, registration_id, dir) = setup().await;
        let qr = issuer.issue(Some(&registration_id)).await.unwrap();

        assert_eq!(issuer.purge_all().await.unwrap(), 1);
        assert!(matches!(issuer.get(&qr.id).await, Err(AppError::NotFound(_))));
        assert!(dir.path().join(&qr.image_path).exists());
    }
}
