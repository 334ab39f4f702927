/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    db,
    error::{AppError, AppResult},
    events::EventManager,
    notify::SmsDispatcher,
    otp::OtpManager,
    qr::QrIssuer,
    rate_limit::{RateLimitConfig, RateLimiter},
    registration::{ApprovalWorkflow, RegistrationStore},
    revocation::RevocationList,
    storage::UploadStore,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Instant};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub events: Arc<EventManager>,
    pub registrations: Arc<RegistrationStore>,
    pub otp: Arc<OtpManager>,
    pub approvals: Arc<ApprovalWorkflow>,
    pub qr: Arc<QrIssuer>,
    pub sms: Arc<SmsDispatcher>,
    pub uploads: Arc<UploadStore>,
    pub revocations: Arc<RevocationList>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.database).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        Self::with_pool(config, db)
    }

    /// Wire services onto an existing pool
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> AppResult<Self> {
        let uploads = UploadStore::new(&config.uploads);
        let sms = SmsDispatcher::from_config(&config.sms)?;

        Ok(Self {
            events: Arc::new(EventManager::new(db.clone())),
            registrations: Arc::new(RegistrationStore::new(db.clone())),
            otp: Arc::new(OtpManager::new(db.clone(), config.otp.clone())),
            approvals: Arc::new(ApprovalWorkflow::new(db.clone())),
            qr: Arc::new(QrIssuer::new(db.clone(), uploads.clone(), &config.qr)),
            sms: Arc::new(sms),
            uploads: Arc::new(uploads),
            revocations: Arc::new(RevocationList::new(db.clone())),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            started_at: Instant::now(),
            config: Arc::new(config),
            db,
        })
    }

    /// Ensure upload directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        for sub in ["photos", "qrcodes"] {
            let dir = config.uploads.directory.join(sub);
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                AppError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
