/// HTTP SMS gateway provider (Semaphore-style form API)
use super::SmsProvider;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SendMessageForm<'a> {
    apikey: &'a str,
    number: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sendername: Option<&'a str>,
}

fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}

pub struct HttpSmsProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_name: Option<String>,
}

impl HttpSmsProvider {
    pub fn new(api_url: String, api_key: String, sender_name: Option<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("barangay-events/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build SMS client: {}", e)))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            sender_name,
        })
    }
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    async fn send(&self, to: &str, message: &str) -> AppResult<()> {
        let form = SendMessageForm {
            apikey: &self.api_key,
            number: to,
            message,
            sendername: self.sender_name.as_deref(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("SMS request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !is_success_status(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "SMS gateway returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
