//! Record store client — persists fulfillment outcome records.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::error::ClientError;
use crate::ids::FulfillmentId;
use crate::pipeline::types::FulfillmentRecord;

const CREATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fulfillment record persistence contract.
///
/// Records are created exactly once per processed, registered-sender
/// message and never updated by this pipeline.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record; returns the minted fulfillment id.
    async fn create(&self, record: &FulfillmentRecord) -> Result<FulfillmentId, ClientError>;
}

/// Wire shape of the record store response.
#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    fulfillment_id: Option<String>,
}

/// HTTP-backed record store (`POST {base}/add-fulfillment`).
pub struct HttpRecordStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create(&self, record: &FulfillmentRecord) -> Result<FulfillmentId, ClientError> {
        let url = format!("{}/add-fulfillment", self.base_url);

        let response = self
            .http
            .post(&url)
            .timeout(CREATE_TIMEOUT)
            .json(record)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed {
                service: "record-store".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: "record-store".into(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateResponse =
            response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse {
                    service: "record-store".into(),
                    reason: e.to_string(),
                })?;

        let raw_id = parsed
            .success
            .then_some(parsed.fulfillment_id)
            .flatten()
            .ok_or_else(|| ClientError::InvalidResponse {
                service: "record-store".into(),
                reason: "missing fulfillment_id".into(),
            })?;

        let id = FulfillmentId::parse(&raw_id).ok_or_else(|| ClientError::InvalidResponse {
            service: "record-store".into(),
            reason: format!("malformed fulfillment id: {raw_id}"),
        })?;

        info!(fulfillment_id = %id, claim_id = %record.claim_id, "Fulfillment record persisted");
        Ok(id)
    }
}
