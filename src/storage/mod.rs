//! Artifact store — durable archival of message content and attachments.

pub mod archive;
pub mod http;

pub use archive::{ClaimArchiver, UploadResult};
pub use http::HttpArtifactStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A durably stored object: time-limited retrieval URL plus the stable key
/// it can be regenerated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub url: String,
    pub key: String,
}

/// Object storage contract. Session/credential handling happens at
/// construction; by the time the pipeline holds one of these, `put_object`
/// is all it needs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectRef, StorageError>;
}
