//! Message extractor — raw RFC 822 bytes to a `QueuedMessage`.
//!
//! Pulls subject, sender address and the first text/plain body part, stages
//! attachments into a claim-scoped directory, and mints the claim id.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use tracing::{debug, warn};

use crate::error::MailError;
use crate::ids::ClaimId;
use crate::pipeline::types::QueuedMessage;

/// Body sentinel used when no text/plain part exists.
pub const NO_CONTENT_SENTINEL: &str = "no content found";

/// Extracts queue entries from raw messages and stages their attachments.
pub struct MessageExtractor {
    staging_root: PathBuf,
}

impl MessageExtractor {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    /// Parse one raw message and stage its attachments.
    ///
    /// Mints a fresh claim id; the staging directory
    /// `{staging_root}/{claim_id}` is created on demand. Individual
    /// attachment failures are logged and skipped.
    pub fn extract(&self, message_id: &str, raw: &[u8]) -> Result<QueuedMessage, MailError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MailError::Unparseable {
                id: message_id.to_string(),
            })?;

        let sender_email = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".into());

        let subject = parsed.subject().unwrap_or("(no subject)").to_string();

        // First text/plain part wins; attachment-disposition parts are
        // excluded by the parser's body indexing.
        let body = parsed
            .body_text(0)
            .map(|t| t.to_string())
            .unwrap_or_else(|| NO_CONTENT_SENTINEL.to_string());

        let received_at = parsed
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or_else(Utc::now);

        let claim_id = ClaimId::mint();
        let attachment_paths = self.stage_attachments(&parsed, &claim_id);

        debug!(
            claim_id = %claim_id,
            sender = %sender_email,
            attachments = attachment_paths.len(),
            "Message extracted"
        );

        Ok(QueuedMessage {
            message_id: message_id.to_string(),
            sender_email,
            subject,
            body,
            claim_id,
            attachment_count: attachment_paths.len(),
            attachment_paths,
            received_at,
        })
    }

    /// Write named attachment parts under the claim's staging directory.
    ///
    /// Filenames are epoch-millis-prefixed to avoid collisions within a
    /// claim; nameless parts are skipped.
    fn stage_attachments(&self, parsed: &mail_parser::Message, claim_id: &ClaimId) -> Vec<PathBuf> {
        let mut staged = Vec::new();
        let claim_dir = self.staging_root.join(claim_id.as_str());

        for part in parsed.attachments() {
            let Some(name) = part.attachment_name() else {
                continue;
            };
            let filename = sanitize_filename(name);

            if staged.is_empty()
                && let Err(e) = std::fs::create_dir_all(&claim_dir)
            {
                warn!(dir = %claim_dir.display(), error = %e, "Failed to create staging directory");
                return staged;
            }

            let unique = format!("{}_{}", Utc::now().timestamp_millis(), filename);
            let path = claim_dir.join(unique);

            match std::fs::write(&path, part.contents()) {
                Ok(()) => {
                    debug!(file = %path.display(), "Attachment staged");
                    staged.push(path);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to stage attachment");
                }
            }
        }

        staged
    }
}

/// Reduce an attachment name to a safe basename.
fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".into());
    base.replace(['\\', ':'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_raw() -> Vec<u8> {
        concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: claims@insurer.test\r\n",
            "Subject: Car accident claim\r\n",
            "Date: Tue, 5 Aug 2025 10:30:00 +0000\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"BOUND\"\r\n",
            "\r\n",
            "--BOUND\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "My car was damaged in an accident. Claim amount: $2500\r\n",
            "--BOUND\r\n",
            "Content-Type: image/jpeg; name=\"photo.jpg\"\r\n",
            "Content-Disposition: attachment; filename=\"photo.jpg\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "/9j/4AAQSkZJRg==\r\n",
            "--BOUND--\r\n",
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn extracts_subject_sender_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MessageExtractor::new(dir.path());
        let msg = extractor.extract("42", &multipart_raw()).unwrap();

        assert_eq!(msg.message_id, "42");
        assert_eq!(msg.sender_email, "alice@example.com");
        assert_eq!(msg.subject, "Car accident claim");
        assert!(msg.body.contains("Claim amount: $2500"));
    }

    #[test]
    fn stages_attachment_under_claim_dir() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MessageExtractor::new(dir.path());
        let msg = extractor.extract("42", &multipart_raw()).unwrap();

        assert_eq!(msg.attachment_count, 1);
        let path = &msg.attachment_paths[0];
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join(msg.claim_id.as_str())));
        let filename = path.file_name().unwrap().to_string_lossy();
        assert!(filename.ends_with("_photo.jpg"));
    }

    #[test]
    fn plain_message_without_attachments() {
        let raw = concat!(
            "From: bob@example.com\r\n",
            "Subject: Question\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Is my policy active?\r\n",
        )
        .as_bytes()
        .to_vec();

        let dir = tempfile::tempdir().unwrap();
        let extractor = MessageExtractor::new(dir.path());
        let msg = extractor.extract("1", &raw).unwrap();

        assert_eq!(msg.attachment_count, 0);
        assert!(msg.attachment_paths.is_empty());
        assert!(msg.body.contains("Is my policy active?"));
        // No staging directory is created when there is nothing to stage.
        assert!(!dir.path().join(msg.claim_id.as_str()).exists());
    }

    #[test]
    fn missing_headers_get_defaults() {
        let raw = b"Content-Type: application/octet-stream\r\n\r\nbinary".to_vec();
        let dir = tempfile::tempdir().unwrap();
        let extractor = MessageExtractor::new(dir.path());
        let msg = extractor.extract("9", &raw).unwrap();

        assert_eq!(msg.sender_email, "unknown");
        assert_eq!(msg.subject, "(no subject)");
        assert_eq!(msg.body, NO_CONTENT_SENTINEL);
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("c:\\evil.exe"), "c__evil.exe");
    }

    #[test]
    fn every_message_gets_a_fresh_claim_id() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = MessageExtractor::new(dir.path());
        let a = extractor.extract("1", &multipart_raw()).unwrap();
        let b = extractor.extract("2", &multipart_raw()).unwrap();
        assert_ne!(a.claim_id, b.claim_id);
    }
}
