/// SMS notification dispatch
///
/// Delivery is advisory: a failed send is logged and counted, never
/// returned to the caller. One attempt per message, no retry or queue.

pub mod http;

pub use http::HttpSmsProvider;

use crate::{config::SmsConfig, error::AppResult, metrics};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// SMS provider backend
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Deliver a message to a normalized contact number
    async fn send(&self, to: &str, message: &str) -> AppResult<()>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

/// Provider used when no SMS API key is configured
#[derive(Debug, Default, Clone)]
pub struct LogOnlyProvider;

#[async_trait]
impl SmsProvider for LogOnlyProvider {
    async fn send(&self, to: &str, message: &str) -> AppResult<()> {
        tracing::info!(to = %to, message = %message, "SMS provider not configured, message logged only");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Normalize a Philippine-style mobile number: strip spaces, dashes and
/// parentheses, then require 10-15 digits with an optional leading '+'
pub fn normalize_contact_number(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.len() < 10 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(cleaned)
}

/// Best-effort SMS dispatcher
#[derive(Clone)]
pub struct SmsDispatcher {
    provider: Arc<dyn SmsProvider>,
}

impl SmsDispatcher {
    pub fn new(provider: Arc<dyn SmsProvider>) -> Self {
        Self { provider }
    }

    /// Pick the provider from configuration
    pub fn from_config(config: &SmsConfig) -> AppResult<Self> {
        let provider: Arc<dyn SmsProvider> = match &config.api_key {
            Some(api_key) => Arc::new(HttpSmsProvider::new(
                config.api_url.clone(),
                api_key.clone(),
                config.sender_name.clone(),
            )?),
            None => {
                tracing::warn!("SMS_API_KEY not set, one-time codes will only be logged");
                Arc::new(LogOnlyProvider)
            }
        };

        Ok(Self::new(provider))
    }

    /// Send one message. Returns whether the provider accepted it; never errors.
    pub async fn send(&self, contact_number: &str, message: &str) -> bool {
        let Some(to) = normalize_contact_number(contact_number) else {
            tracing::warn!(contact = %contact_number, "SMS not sent: malformed contact number");
            metrics::record_sms_dispatch("invalid_number");
            return false;
        };

        match self.provider.send(&to, message).await {
            Ok(()) => {
                tracing::info!(to = %to, provider = self.provider.name(), "SMS sent");
                metrics::record_sms_dispatch("sent");
                true
            }
            Err(e) => {
                tracing::warn!(
                    to = %to,
                    provider = self.provider.name(),
                    error = %e,
                    "SMS dispatch failed"
                );
                metrics::record_sms_dispatch("failed");
                false
            }
        }
    }

    /// Log a one-time code and hand it to the provider on a detached task.
    ///
    /// Call only after the code has been persisted. The log line is the
    /// fallback delivery channel, so it is written whether or not a
    /// contact number exists.
    pub fn dispatch_otp(
        &self,
        contact_number: Option<String>,
        registration_id: &str,
        code: &str,
    ) -> Option<JoinHandle<bool>> {
        tracing::info!(
            registration_id = %registration_id,
            code = %code,
            "one-time code issued"
        );

        let Some(contact_number) = contact_number else {
            tracing::warn!(registration_id = %registration_id, "no contact number, SMS skipped");
            metrics::record_sms_dispatch("no_contact");
            return None;
        };

        let message = format!(
            "Your barangay event registration code is {}. Do not share this code with anyone.",
            code
        );
        let dispatcher = self.clone();

        Some(tokio::spawn(async move {
            dispatcher.send(&contact_number, &message).await
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsProvider for RecordingProvider {
        async fn send(&self, to: &str, message: &str) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), message.to_string()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SmsProvider for FailingProvider {
        async fn send(&self, _to: &str, _message: &str) -> AppResult<()> {
            Err(AppError::Internal("provider unreachable".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_normalize_contact_number() {
        assert_eq!(
            normalize_contact_number("0917-123-4567").as_deref(),
            Some("09171234567")
        );
        assert_eq!(
            normalize_contact_number("+63 917 123 4567").as_deref(),
            Some("+639171234567")
        );
        assert_eq!(normalize_contact_number("12345"), None);
        assert_eq!(normalize_contact_number("0917abc4567"), None);
        assert_eq!(normalize_contact_number(""), None);
    }

    #[tokio::test]
    async fn test_send_success() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = SmsDispatcher::new(provider.clone());

        assert!(dispatcher.send("0917 123 4567", "hello").await);
        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "09171234567");
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let dispatcher = SmsDispatcher::new(Arc::new(FailingProvider));
        assert!(!dispatcher.send("09171234567", "hello").await);
    }

    #[tokio::test]
    async fn test_malformed_number_not_sent() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = SmsDispatcher::new(provider.clone());

        assert!(!dispatcher.send("not-a-number", "hello").await);
        assert!(provider.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_otp_runs_detached() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = SmsDispatcher::new(provider.clone());

        let handle = dispatcher
            .dispatch_otp(Some("09171234567".to_string()), "reg-1", "123456")
            .unwrap();
        assert!(handle.await.unwrap());

        let sent = provider.sent.lock().unwrap();
        assert!(sent[0].1.contains("123456"));
    }

    #[tokio::test]
    async fn test_dispatch_otp_without_contact() {
        let dispatcher = SmsDispatcher::new(Arc::new(LogOnlyProvider));
        assert!(dispatcher.dispatch_otp(None, "reg-1", "123456").is_none());
    }
}
