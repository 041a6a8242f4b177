//! HTTP object-gateway implementation of `ArtifactStore`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use crate::config::ArtifactConfig;
use crate::error::StorageError;
use crate::storage::{ArtifactStore, ObjectRef};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Wire shape of the gateway's put response.
#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
    key: String,
}

/// Uploads objects with `PUT {gateway}/objects/{key}`, bearer-authenticated.
/// The gateway answers with the object key and a time-limited download URL.
pub struct HttpArtifactStore {
    config: ArtifactConfig,
    http: reqwest::Client,
}

impl HttpArtifactStore {
    pub fn new(config: ArtifactConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectRef, StorageError> {
        let url = format!("{}/objects/{}", self.config.gateway_url, key);
        let size = bytes.len();

        let response = self
            .http
            .put(&url)
            .timeout(UPLOAD_TIMEOUT)
            .bearer_auth(self.config.token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(StorageError::Auth(format!("gateway returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                key: key.to_string(),
                reason: format!("status {status}: {body}"),
            });
        }

        let parsed: PutResponse =
            response
                .json()
                .await
                .map_err(|e| StorageError::InvalidResponse {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;

        debug!(key = %parsed.key, bytes = size, "Object archived");
        Ok(ObjectRef {
            url: parsed.url,
            key: parsed.key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_put_response() {
        let json = r#"{"url": "https://store.test/dl/abc?sig=xyz", "key": "claims/a/b.txt"}"#;
        let parsed: PutResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.key, "claims/a/b.txt");
        assert!(parsed.url.contains("sig="));
    }
}
