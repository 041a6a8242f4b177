//! Orchestrator — drains the intake queue and runs the per-message claim
//! state machine.
//!
//! States: NEW → VALIDATING → {REJECTED | ASSESSING} →
//! {ASSESSMENT_FAILED | DECIDED} → {COMPLETED_PERSISTED | PENDING_NOTIFIED}.
//!
//! Processing is strictly sequential: one message is fully resolved before
//! the next is dequeued. This bounds concurrent load on the validation,
//! model and notification collaborators and keeps replies in intake order.
//! No step retries within a run; resilience lives at the poll-cycle level.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::clients::{NotificationClient, RecordStore, ValidationClient};
use crate::intake::IntakeQueue;
use crate::llm::AssessmentClient;
use crate::pipeline::decision::DecisionParser;
use crate::pipeline::prompt::build_assessment_parts;
use crate::pipeline::types::{
    Assessment, ClaimOutcome, FulfillmentRecord, FulfillmentStatus, QueuedMessage,
    summarize_mail_content,
};
use crate::storage::{ClaimArchiver, UploadResult};
use crate::templates::TemplateStore;

/// Subject used for PENDING replies (the template body carries the detail).
const PENDING_REPLY_SUBJECT: &str = "Insurance Claim - Additional Information Required";

/// Per-message processing states, for transition logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimState {
    New,
    Validating,
    Rejected,
    Assessing,
    AssessmentFailed,
    Decided,
    CompletedPersisted,
    PendingNotified,
}

impl ClaimState {
    fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Assessing => "assessing",
            Self::AssessmentFailed => "assessment_failed",
            Self::Decided => "decided",
            Self::CompletedPersisted => "completed_persisted",
            Self::PendingNotified => "pending_notified",
        }
    }
}

/// Sequences validation → assessment → decision → side effects for each
/// queued message. All collaborators are injected at construction.
pub struct Orchestrator {
    validation: Arc<dyn ValidationClient>,
    assessor: Arc<dyn AssessmentClient>,
    notifier: Arc<dyn NotificationClient>,
    records: Arc<dyn RecordStore>,
    /// `None` when archival is disabled; COMPLETED claims then persist
    /// without archive references (degraded-but-recorded).
    archiver: Option<ClaimArchiver>,
    parser: DecisionParser,
    templates: TemplateStore,
    /// Applied after each message to pace downstream collaborators.
    process_delay: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        validation: Arc<dyn ValidationClient>,
        assessor: Arc<dyn AssessmentClient>,
        notifier: Arc<dyn NotificationClient>,
        records: Arc<dyn RecordStore>,
        archiver: Option<ClaimArchiver>,
        templates: TemplateStore,
        process_delay: Duration,
    ) -> Self {
        Self {
            validation,
            assessor,
            notifier,
            records,
            archiver,
            parser: DecisionParser::new(templates.clone()),
            templates,
            process_delay,
        }
    }

    /// Process every queued message in order, pacing between messages.
    pub async fn drain(&self, queue: &IntakeQueue) -> usize {
        let mut processed = 0;
        while let Some(message) = queue.pop().await {
            let claim_id = message.claim_id.clone();
            let remaining = queue.len().await;
            info!(claim_id = %claim_id, remaining, "Dequeued message for processing");

            let outcome = self.process(message).await;
            info!(claim_id = %claim_id, outcome = outcome.label(), "Claim resolved");
            processed += 1;

            tokio::time::sleep(self.process_delay).await;
        }
        processed
    }

    /// Run one message through the full state machine.
    pub async fn process(&self, message: QueuedMessage) -> ClaimOutcome {
        let claim_id = message.claim_id.clone();
        info!(
            claim_id = %claim_id,
            sender = %message.sender_email,
            subject = %message.subject,
            attachments = message.attachment_count,
            "Processing claim message"
        );

        // ── VALIDATING ──────────────────────────────────────────────
        self.transition(&message, ClaimState::New, ClaimState::Validating);

        let policy = if !message.sender_email.contains('@') {
            debug!(claim_id = %claim_id, sender = %message.sender_email, "Malformed sender address");
            None
        } else {
            match self.validation.lookup(&message.sender_email).await {
                Ok(policy) => policy,
                Err(e) => {
                    // Collaborator unreachable: drop without a rejection
                    // notice; the sender may well be registered.
                    error!(claim_id = %claim_id, error = %e, "Validation lookup failed");
                    return ClaimOutcome::Failed {
                        reason: format!("validation lookup failed: {e}"),
                    };
                }
            }
        };

        let Some(policy) = policy else {
            self.transition(&message, ClaimState::Validating, ClaimState::Rejected);
            self.send_rejection(&message).await;
            return ClaimOutcome::Rejected;
        };

        info!(
            claim_id = %claim_id,
            policy_type = %policy.policy_type,
            policy_issued = %policy.policy_issued_date,
            "Sender registered, proceeding with assessment"
        );

        // ── ASSESSING ───────────────────────────────────────────────
        self.transition(&message, ClaimState::Validating, ClaimState::Assessing);

        let parts = build_assessment_parts(&message);
        let system_prompt = self.templates.system_prompt();
        let raw = match self.assessor.assess(&system_prompt, &parts).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(claim_id = %claim_id, error = %e, "Assessment call failed, dropping message");
                self.transition(&message, ClaimState::Assessing, ClaimState::AssessmentFailed);
                return ClaimOutcome::AssessmentFailed;
            }
        };

        // ── DECIDED ─────────────────────────────────────────────────
        self.transition(&message, ClaimState::Assessing, ClaimState::Decided);
        let assessment = self.parser.parse(&raw, &message);
        info!(
            claim_id = %claim_id,
            status = assessment.status.label(),
            satisfied = assessment.satisfied_items.len(),
            "Assessment decided"
        );

        match assessment.status {
            FulfillmentStatus::Completed => {
                let outcome = self.handle_completed(&message).await;
                if matches!(outcome, ClaimOutcome::CompletedPersisted { .. }) {
                    self.transition(&message, ClaimState::Decided, ClaimState::CompletedPersisted);
                }
                outcome
            }
            FulfillmentStatus::Pending => {
                let outcome = self.handle_pending(&message, &assessment).await;
                if outcome == ClaimOutcome::PendingNotified {
                    self.transition(&message, ClaimState::Decided, ClaimState::PendingNotified);
                }
                outcome
            }
        }
    }

    fn transition(&self, message: &QueuedMessage, from: ClaimState, to: ClaimState) {
        debug!(
            claim_id = %message.claim_id,
            from = from.label(),
            to = to.label(),
            "State transition"
        );
    }

    /// REJECTED side effect: fixed template notice, no record.
    async fn send_rejection(&self, message: &QueuedMessage) {
        let mail = self
            .templates
            .unregistered_sender(message.claim_id.as_str(), &message.sender_email);
        match self
            .notifier
            .send(&message.sender_email, &mail.subject, &mail.body)
            .await
        {
            Ok(()) => {
                info!(claim_id = %message.claim_id, "Rejection notice sent to unregistered sender");
            }
            Err(e) => {
                error!(claim_id = %message.claim_id, error = %e, "Failed to send rejection notice");
            }
        }
    }

    /// COMPLETED side effects: archive, persist, then clean up staging —
    /// cleanup runs only after both archival and persistence succeeded.
    async fn handle_completed(&self, message: &QueuedMessage) -> ClaimOutcome {
        let upload = match &self.archiver {
            Some(archiver) => match archiver.upload_claim(message).await {
                Ok(upload) => Some(upload),
                Err(e) => {
                    error!(
                        claim_id = %message.claim_id,
                        error = %e,
                        "Archive upload failed, persisting record without archive references"
                    );
                    None
                }
            },
            None => {
                warn!(claim_id = %message.claim_id, "Archival disabled, persisting record without archive references");
                None
            }
        };

        let record = build_completed_record(message, upload.as_ref());
        match self.records.create(&record).await {
            Ok(fulfillment_id) => {
                info!(
                    claim_id = %message.claim_id,
                    fulfillment_id = %fulfillment_id,
                    archived = upload.is_some(),
                    "Completed fulfillment persisted"
                );
            }
            Err(e) => {
                error!(claim_id = %message.claim_id, error = %e, "Failed to persist completed record");
                // Local evidence stays on disk for the sweeper/operator.
                return ClaimOutcome::Failed {
                    reason: format!("record persistence failed: {e}"),
                };
            }
        }

        if upload.is_some() {
            self.cleanup_staged_files(message);
        }

        ClaimOutcome::CompletedPersisted {
            archived: upload.is_some(),
        }
    }

    /// PENDING side effects: persist with local references, then notify.
    /// Persistence failure is logged but does not block the notification
    /// attempt (decoupled best-effort).
    async fn handle_pending(&self, message: &QueuedMessage, assessment: &Assessment) -> ClaimOutcome {
        let record = build_pending_record(message, assessment);
        match self.records.create(&record).await {
            Ok(fulfillment_id) => {
                info!(
                    claim_id = %message.claim_id,
                    fulfillment_id = %fulfillment_id,
                    "Pending fulfillment persisted"
                );
            }
            Err(e) => {
                error!(claim_id = %message.claim_id, error = %e, "Failed to persist pending record");
            }
        }

        match self
            .notifier
            .send(
                &message.sender_email,
                PENDING_REPLY_SUBJECT,
                &assessment.reply_body,
            )
            .await
        {
            Ok(()) => {
                info!(
                    claim_id = %message.claim_id,
                    missing = %assessment.missing_items,
                    "Pending reply sent requesting missing information"
                );
                ClaimOutcome::PendingNotified
            }
            Err(e) => {
                error!(claim_id = %message.claim_id, error = %e, "Failed to send pending reply");
                ClaimOutcome::Failed {
                    reason: format!("notification failed: {e}"),
                }
            }
        }
    }

    /// Delete staged files and the now-empty claim directory. Failures are
    /// logged only; they never affect the pipeline outcome.
    fn cleanup_staged_files(&self, message: &QueuedMessage) {
        let mut deleted = 0usize;
        for path in &message.attachment_paths {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    deleted += 1;
                    debug!(file = %path.display(), "Deleted staged file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(file = %path.display(), "Staged file already gone");
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to delete staged file");
                }
            }
        }

        if let Some(claim_dir) = message.attachment_paths.first().and_then(|p| p.parent()) {
            match std::fs::read_dir(claim_dir) {
                Ok(mut entries) => {
                    if entries.next().is_none() {
                        if let Err(e) = std::fs::remove_dir(claim_dir) {
                            warn!(dir = %claim_dir.display(), error = %e, "Failed to remove claim directory");
                        } else {
                            debug!(dir = %claim_dir.display(), "Removed empty claim directory");
                        }
                    } else {
                        debug!(dir = %claim_dir.display(), "Claim directory not empty, leaving in place");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(dir = %claim_dir.display(), error = %e, "Failed to inspect claim directory");
                }
            }
        }

        if deleted > 0 {
            info!(claim_id = %message.claim_id, deleted, "Staged evidence cleaned up after archival");
        }
    }
}

// ── Record construction ─────────────────────────────────────────────

fn staged_basenames(message: &QueuedMessage) -> Option<Vec<String>> {
    if message.attachment_paths.is_empty() {
        return None;
    }
    Some(
        message
            .attachment_paths
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect(),
    )
}

fn build_completed_record(
    message: &QueuedMessage,
    upload: Option<&UploadResult>,
) -> FulfillmentRecord {
    FulfillmentRecord {
        user_mail: message.sender_email.clone(),
        claim_id: message.claim_id.as_str().to_string(),
        mail_content: summarize_mail_content(&message.subject, &message.body),
        mail_content_url: upload.map(|u| u.mail_content.url.clone()),
        attachment_count: upload
            .map(|u| u.total_attachments)
            .unwrap_or(message.attachment_count),
        attachment_urls: upload
            .map(|u| u.attachments.iter().map(|a| a.url.clone()).collect()),
        local_attachment_paths: staged_basenames(message),
        fulfillment_status: FulfillmentStatus::Completed,
        missing_items: None,
        uploaded_at: upload.map(|_| Utc::now()),
    }
}

fn build_pending_record(message: &QueuedMessage, assessment: &Assessment) -> FulfillmentRecord {
    FulfillmentRecord {
        user_mail: message.sender_email.clone(),
        claim_id: message.claim_id.as_str().to_string(),
        mail_content: summarize_mail_content(&message.subject, &message.body),
        mail_content_url: None,
        attachment_count: message.attachment_count,
        attachment_urls: None,
        local_attachment_paths: staged_basenames(message),
        fulfillment_status: FulfillmentStatus::Pending,
        missing_items: (!assessment.missing_items.is_empty())
            .then(|| assessment.missing_items.clone()),
        uploaded_at: None,
    }
}
