//! Assessment prompt assembly.
//!
//! The model gets one user message: a text segment with claim metadata, the
//! full body, an enumerated attachment manifest and the assessment
//! checklist, followed by inline image data for image-type attachments so
//! it can visually corroborate the evidence.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use crate::llm::provider::PromptPart;
use crate::pipeline::types::QueuedMessage;

/// Extensions whose staged files are inlined as image evidence.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Build the prompt parts for one claim assessment.
pub fn build_assessment_parts(message: &QueuedMessage) -> Vec<PromptPart> {
    let mut text = format!(
        "CLAIM FULFILLMENT ASSESSMENT\n\n\
         CUSTOMER DETAILS:\n\
         Email: {}\n\
         Subject: {}\n\
         Claim ID: {}\n\n\
         EMAIL CONTENT TO ANALYZE:\n\
         {}\n\n\
         ATTACHMENTS PROVIDED ({}):\n",
        message.sender_email,
        message.subject,
        message.claim_id,
        message.body,
        message.attachment_count
    );

    if message.attachment_paths.is_empty() {
        text.push_str("No attachments provided");
    } else {
        let manifest: Vec<String> = message
            .attachment_paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "unknown".into());
                let ext = extension_of(path);
                let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                format!("{}. {filename} (.{ext}, {size} bytes)", i + 1)
            })
            .collect();
        text.push_str(&manifest.join("\n"));
    }

    text.push_str(
        "\n\nPLEASE ASSESS:\n\
         - REASON FOR CLAIM: Is there a clear description of what happened?\n\
         - CLAIM AMOUNT: Look carefully for ANY monetary amount in the email content. Accept formats like:\n\
            - 'claim amount: 3,00,000' (Indian format)\n\
            - 'amount: 250000' or '$2500' or 'Rs 25000'\n\
            - 'cost: 25000', 'damage: 2,50,000', 'total: 300000'\n\
            - ANY clear monetary value or number that represents money\n\
            If you find ANY monetary reference, consider CLAIM AMOUNT as PROVIDED!\n\
         - SUPPORTING PROOFS: Do the attachments support the claim (bills, photos, reports)?\n",
    );

    let mut parts = vec![PromptPart::Text(text)];

    for path in &message.attachment_paths {
        let ext = extension_of(path);
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        match std::fs::read(path) {
            Ok(bytes) => {
                debug!(file = %path.display(), "Inlining image for analysis");
                parts.push(PromptPart::Image {
                    media_type: mime_for_extension(&ext),
                    data: BASE64.encode(bytes),
                });
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to read image attachment, skipping");
            }
        }
    }

    parts
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn mime_for_extension(ext: &str) -> String {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/png",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ids::ClaimId;

    fn base_message() -> QueuedMessage {
        QueuedMessage {
            message_id: "1".into(),
            sender_email: "alice@example.com".into(),
            subject: "Car accident".into(),
            body: "My car was damaged. Amount: $2500".into(),
            claim_id: ClaimId::parse("CLAIM_AB12CD34_20250805").unwrap(),
            attachment_paths: vec![],
            attachment_count: 0,
            received_at: Utc::now(),
        }
    }

    fn text_of(parts: &[PromptPart]) -> &str {
        match &parts[0] {
            PromptPart::Text(t) => t,
            _ => panic!("first part must be text"),
        }
    }

    #[test]
    fn prompt_includes_metadata_and_body() {
        let parts = build_assessment_parts(&base_message());
        let text = text_of(&parts);
        assert!(text.contains("Email: alice@example.com"));
        assert!(text.contains("Subject: Car accident"));
        assert!(text.contains("Claim ID: CLAIM_AB12CD34_20250805"));
        assert!(text.contains("My car was damaged. Amount: $2500"));
        assert!(text.contains("PLEASE ASSESS"));
    }

    #[test]
    fn no_attachments_noted_in_manifest() {
        let parts = build_assessment_parts(&base_message());
        assert_eq!(parts.len(), 1);
        assert!(text_of(&parts).contains("No attachments provided"));
    }

    #[test]
    fn manifest_enumerates_files_with_size() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("1722850000000_bill.pdf");
        std::fs::write(&pdf, vec![0u8; 512]).unwrap();

        let mut message = base_message();
        message.attachment_paths = vec![pdf];
        message.attachment_count = 1;

        let parts = build_assessment_parts(&message);
        let text = text_of(&parts);
        assert!(text.contains("ATTACHMENTS PROVIDED (1):"));
        assert!(text.contains("1. 1722850000000_bill.pdf (.pdf, 512 bytes)"));
        // PDFs are listed but not inlined
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn image_attachments_are_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("photo.jpg");
        std::fs::write(&img, b"fakejpegdata").unwrap();

        let mut message = base_message();
        message.attachment_paths = vec![img];
        message.attachment_count = 1;

        let parts = build_assessment_parts(&message);
        assert_eq!(parts.len(), 2);
        match &parts[1] {
            PromptPart::Image { media_type, data } => {
                assert_eq!(media_type, "image/jpeg");
                assert_eq!(data, &BASE64.encode(b"fakejpegdata"));
            }
            other => panic!("expected image part, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_image_is_skipped() {
        let mut message = base_message();
        message.attachment_paths = vec![std::path::PathBuf::from("/nonexistent/ghost.png")];
        message.attachment_count = 1;

        let parts = build_assessment_parts(&message);
        assert_eq!(parts.len(), 1);
    }
}
