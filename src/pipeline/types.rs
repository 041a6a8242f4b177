//! Shared types for the claim processing pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ClaimId;

// ── Queued message ──────────────────────────────────────────────────

/// One extracted inbound message awaiting assessment.
///
/// Created by the message extractor, consumed exactly once by the
/// orchestrator. Immutable after creation.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Mailbox-native message id.
    pub message_id: String,
    /// Sender address parsed from the `From` header.
    pub sender_email: String,
    pub subject: String,
    /// First text/plain body part, or the "no content found" sentinel.
    pub body: String,
    /// Claim id minted for this message.
    pub claim_id: ClaimId,
    /// Staged attachment files under the claim's staging directory.
    pub attachment_paths: Vec<PathBuf>,
    pub attachment_count: usize,
    pub received_at: DateTime<Utc>,
}

// ── Assessment ──────────────────────────────────────────────────────

/// Final fulfillment status of a claim submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Completed,
}

impl FulfillmentStatus {
    /// Short label for logging and record persistence.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// Parsed outcome of one model assessment.
///
/// Produced once per message by the decision parser; never mutated
/// afterwards (the failsafe override is applied before this is returned).
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub status: FulfillmentStatus,
    /// Bullet list of missing requirements; empty when COMPLETED.
    pub missing_items: String,
    /// Bullet lines for requirements deemed satisfied, in category order.
    pub satisfied_items: Vec<String>,
    /// Rendered reply body for the PENDING branch; empty when COMPLETED.
    pub reply_body: String,
}

// ── Fulfillment record ──────────────────────────────────────────────

/// Durable outcome record for one processed, registered-sender message.
///
/// Persisted exactly once via the record store collaborator; a later
/// message from the same sender produces a new record with a new claim id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentRecord {
    pub user_mail: String,
    pub claim_id: String,
    /// Subject + body summary, capped at 1000 characters.
    pub mail_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_content_url: Option<String>,
    pub attachment_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_urls: Option<Vec<String>>,
    /// Staged attachment basenames, kept for reference on non-archived
    /// records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_attachment_paths: Option<Vec<String>>,
    pub fulfillment_status: FulfillmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Cap applied to the persisted mail content summary.
pub const MAIL_CONTENT_CAP: usize = 1000;

/// Build the persisted content summary from subject and body.
pub fn summarize_mail_content(subject: &str, body: &str) -> String {
    let full = format!("Subject: {subject}\nContent: {body}");
    full.chars().take(MAIL_CONTENT_CAP).collect()
}

// ── Claim outcome ───────────────────────────────────────────────────

/// Terminal state of the per-message state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Sender unknown to the validation service; rejection notice sent,
    /// no record created.
    Rejected,
    /// The model call failed; message dropped for this run.
    AssessmentFailed,
    /// COMPLETED assessment persisted. `archived` is false when the
    /// artifact store was unavailable (degraded-but-recorded).
    CompletedPersisted { archived: bool },
    /// PENDING assessment persisted and the customer notified.
    PendingNotified,
    /// A side effect failed after the decision; no retry this run.
    Failed { reason: String },
}

impl ClaimOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::AssessmentFailed => "assessment_failed",
            Self::CompletedPersisted { .. } => "completed_persisted",
            Self::PendingNotified => "pending_notified",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(FulfillmentStatus::Pending.label(), "pending");
        assert_eq!(FulfillmentStatus::Completed.label(), "completed");
    }

    #[test]
    fn summary_is_capped() {
        let body = "x".repeat(2000);
        let summary = summarize_mail_content("Claim", &body);
        assert_eq!(summary.chars().count(), MAIL_CONTENT_CAP);
        assert!(summary.starts_with("Subject: Claim\nContent: "));
    }

    #[test]
    fn record_serialization_omits_absent_fields() {
        let record = FulfillmentRecord {
            user_mail: "a@b.com".into(),
            claim_id: "CLAIM_AB12CD34_20250805".into(),
            mail_content: "Subject: x\nContent: y".into(),
            mail_content_url: None,
            attachment_count: 0,
            attachment_urls: None,
            local_attachment_paths: None,
            fulfillment_status: FulfillmentStatus::Pending,
            missing_items: Some("- claim amount".into()),
            uploaded_at: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fulfillment_status"], "pending");
        assert!(json.get("mail_content_url").is_none());
        assert!(json.get("attachment_urls").is_none());
        assert_eq!(json["missing_items"], "- claim amount");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(ClaimOutcome::Rejected.label(), "rejected");
        assert_eq!(
            ClaimOutcome::CompletedPersisted { archived: true }.label(),
            "completed_persisted"
        );
    }
}
