//! User validation client — "is this sender a known policyholder?"

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ClientError;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Policy details returned for a registered sender.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyInfo {
    pub id: i64,
    pub policy_type: String,
    pub policy_issued_date: String,
}

/// Sender lookup contract. Not-registered is a normal outcome (`Ok(None)`),
/// not an error.
#[async_trait]
pub trait ValidationClient: Send + Sync {
    async fn lookup(&self, email: &str) -> Result<Option<PolicyInfo>, ClientError>;
}

/// Wire shape of the validation service response.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    success: bool,
    #[serde(default)]
    data: Option<PolicyInfo>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP-backed validation client (`GET {base}/user/{email}`).
pub struct HttpValidationClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpValidationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ValidationClient for HttpValidationClient {
    async fn lookup(&self, email: &str) -> Result<Option<PolicyInfo>, ClientError> {
        let url = format!("{}/user/{}", self.base_url, email);

        let response = self
            .http
            .get(&url)
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed {
                service: "validation".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: "validation".into(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: LookupResponse =
            response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse {
                    service: "validation".into(),
                    reason: e.to_string(),
                })?;

        if parsed.success {
            Ok(parsed.data)
        } else {
            debug!(
                email = %email,
                message = parsed.message.as_deref().unwrap_or("User not found"),
                "Sender not registered"
            );
            Ok(None)
        }
    }
}
