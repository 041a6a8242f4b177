//! Claim bundle archival — mail content plus attachments, keyed by sender
//! and claim id.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::StorageError;
use crate::ids::ClaimId;
use crate::pipeline::types::QueuedMessage;
use crate::storage::{ArtifactStore, ObjectRef};

/// Archive references for a completed claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub claim_id: ClaimId,
    pub mail_content: ObjectRef,
    pub attachments: Vec<ObjectRef>,
    pub total_attachments: usize,
}

/// Archives claim bundles under `{prefix}/{sender}/claims/{claim_id}/`.
pub struct ClaimArchiver {
    store: Arc<dyn ArtifactStore>,
    prefix: String,
}

impl ClaimArchiver {
    pub fn new(store: Arc<dyn ArtifactStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Upload the message body and every staged attachment.
    ///
    /// The mail content upload must succeed; individual attachment failures
    /// are logged and skipped.
    pub async fn upload_claim(&self, message: &QueuedMessage) -> Result<UploadResult, StorageError> {
        let base = format!(
            "{}/{}/claims/{}",
            self.prefix, message.sender_email, message.claim_id
        );

        let mail_content = render_mail_content(message);
        let content_ref = self
            .store
            .put_object(
                &format!("{base}/mail_content.txt"),
                mail_content.into_bytes(),
                "text/plain",
            )
            .await?;

        let mut attachments = Vec::new();
        for path in &message.attachment_paths {
            let Some(filename) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to read staged attachment");
                    continue;
                }
            };

            let key = format!("{base}/attachments/{filename}");
            match self
                .store
                .put_object(&key, bytes, content_type_for(path))
                .await
            {
                Ok(obj) => attachments.push(obj),
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to archive attachment");
                }
            }
        }

        info!(
            claim_id = %message.claim_id,
            uploaded = attachments.len(),
            total = message.attachment_paths.len(),
            "Claim bundle archived"
        );

        Ok(UploadResult {
            claim_id: message.claim_id.clone(),
            mail_content: content_ref,
            total_attachments: attachments.len(),
            attachments,
        })
    }
}

/// Archived mail content body.
fn render_mail_content(message: &QueuedMessage) -> String {
    format!(
        "Subject: {}\nFrom: {}\nTimestamp: {}\nClaim ID: {}\n\nContent:\n{}\n",
        message.subject,
        message.sender_email,
        message.received_at.to_rfc3339(),
        message.claim_id,
        message.body
    )
}

/// Content type from the attachment's file extension.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
