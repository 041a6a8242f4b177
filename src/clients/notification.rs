//! Notification client — sends reply emails through the mail service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::ClientError;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound customer notification contract.
#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ClientError>;
}

/// Wire shape of the mail service request.
#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    mail_id: &'a str,
    subject: &'a str,
    mail_content: &'a str,
}

/// HTTP-backed notification client (`POST {base}/send-mail`).
pub struct HttpNotificationClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpNotificationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationClient for HttpNotificationClient {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ClientError> {
        let url = format!("{}/send-mail", self.base_url);
        let request = MailRequest {
            mail_id: to,
            subject,
            mail_content: body,
        };

        let response = self
            .http
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed {
                service: "notification".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: "notification".into(),
                status: status.as_u16(),
                body,
            });
        }

        info!(to = %to, subject = %subject, "Notification sent");
        Ok(())
    }
}
