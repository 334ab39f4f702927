/// Configuration management for the registration service
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub authentication: AuthConfig,
    pub uploads: UploadConfig,
    pub sms: SmsConfig,
    pub otp: OtpConfig,
    pub qr: QrConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Deployment environment name ("development", "production", ...)
    pub environment: String,
}

impl ServiceConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Root directory for photos and rendered QR images
    pub directory: PathBuf,
    /// Accepted photo MIME types
    pub allowed_image_types: Vec<String>,
    /// Maximum photo size in bytes
    pub max_upload_size: usize,
}

/// SMS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Provider API key; when absent codes are only logged
    pub api_key: Option<String>,
    pub api_url: String,
    pub sender_name: Option<String>,
}

/// One-time passcode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    pub ttl_secs: i64,
    pub max_attempts: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            max_attempts: 3,
        }
    }
}

/// QR credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    pub validity_days: i64,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self { validity_days: 30 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/barangay.sqlite"));
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        let acquire_timeout_secs = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;

        let upload_directory = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let allowed_image_types = env::var("ALLOWED_IMAGE_TYPES")
            .unwrap_or_else(|_| "image/jpeg,image/png,image/webp".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<String>>();
        let max_upload_size = env::var("MAX_UPLOAD_SIZE")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .unwrap_or(5242880);

        let sms_api_key = env::var("SMS_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let sms_api_url = env::var("SMS_API_URL")
            .unwrap_or_else(|_| "https://api.semaphore.co/api/v4/messages".to_string());
        let sms_sender_name = env::var("SMS_SENDER_NAME").ok();

        let otp_defaults = OtpConfig::default();
        let otp_ttl_secs = env::var("OTP_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(otp_defaults.ttl_secs);
        let otp_max_attempts = env::var("OTP_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(otp_defaults.max_attempts);

        let qr_validity_days = env::var("QR_VALIDITY_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(QrConfig::default().validity_days);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "barangay_events=debug,tower_http=debug".to_string());
        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                environment,
            },
            database: DatabaseConfig {
                path: database_path,
                max_connections,
                acquire_timeout_secs,
            },
            authentication: AuthConfig { jwt_secret },
            uploads: UploadConfig {
                directory: upload_directory,
                allowed_image_types,
                max_upload_size,
            },
            sms: SmsConfig {
                api_key: sms_api_key,
                api_url: sms_api_url,
                sender_name: sms_sender_name,
            },
            otp: OtpConfig {
                ttl_secs: otp_ttl_secs,
                max_attempts: otp_max_attempts,
            },
            qr: QrConfig {
                validity_days: qr_validity_days,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.uploads.allowed_image_types.is_empty() {
            return Err(AppError::Validation(
                "At least one allowed image type is required".to_string(),
            ));
        }

        if self.uploads.max_upload_size == 0 || self.database.max_connections == 0 {
            return Err(AppError::Validation(
                "Upload size and connection limits must be positive".to_string(),
            ));
        }

        if self.otp.ttl_secs <= 0 || self.otp.max_attempts <= 0 || self.qr.validity_days <= 0 {
            return Err(AppError::Validation(
                "OTP and QR lifetimes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration used by unit tests, rooted at the given upload directory
    #[cfg(test)]
    pub fn for_tests(upload_dir: &std::path::Path) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
                acquire_timeout_secs: 5,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-test-secret-test-secret-0123".to_string(),
            },
            uploads: UploadConfig {
                directory: upload_dir.to_path_buf(),
                allowed_image_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
                max_upload_size: 1024 * 1024,
            },
            sms: SmsConfig {
                api_key: None,
                api_url: "http://127.0.0.1:9/sms".to_string(),
                sender_name: None,
            },
            otp: OtpConfig::default(),
            qr: QrConfig::default(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}
