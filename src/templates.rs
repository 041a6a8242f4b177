//! Reply and prompt templates.
//!
//! Templates are plain text files in the templates directory. The first line
//! may carry a `Subject: ...` header; the body starts after it (skipping one
//! blank line). Placeholders `{claim_id}`, `{user_email}`,
//! `{satisfied_items}` and `{missing_items}` are substituted verbatim.
//! Every template has a compiled-in fallback used when the file is missing
//! or unreadable, so a broken deployment still sends something sensible.

use std::path::PathBuf;

use tracing::warn;

const UNREGISTERED_SENDER_FILE: &str = "unregistered_sender.txt";
const PENDING_REPLY_FILE: &str = "pending_reply.txt";
const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";

const FALLBACK_UNREGISTERED: &str = "\
Subject: Insurance Claim - Registration Required

Dear Customer,

Your email {user_email} is not registered in our system.

Claim Reference: {claim_id}

Please contact customer service.

Best regards,
Insurance Claims Team";

const FALLBACK_PENDING: &str = "\
Subject: Insurance Claim - Additional Information Required

Dear Customer,

Thank you for submitting your insurance claim. We have reviewed your submission:

REQUIREMENTS SATISFIED:
{satisfied_items}

MISSING REQUIREMENTS:
{missing_items}

Please reply with the missing information and supporting documents.

Best regards,
Insurance Claims Team";

const FALLBACK_SYSTEM_PROMPT: &str = "\
You are an insurance claim fulfillment assessor. You receive one customer
email (with an attachment manifest and any attached images) and decide
whether the submission contains everything needed to process the claim:
a clear reason for the claim, a claim amount, and supporting proof.

Respond using EXACTLY this format:

FULFILLMENT_STATUS: COMPLETED
or
FULFILLMENT_STATUS: PENDING
MISSING_ITEMS:
- <one missing item per line>

Rules:
- Report COMPLETED only when reason, amount and proof are all present.
- Under MISSING_ITEMS list only what is genuinely missing, one per line.
- Accept any clear monetary value as the claim amount, in any format.
- Do not add commentary outside the markers.";

/// A rendered outbound mail: subject line plus body text.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMail {
    pub subject: String,
    pub body: String,
}

/// Loads templates from a directory, falling back to built-in defaults.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read a template file, or `None` if missing/unreadable.
    fn load(&self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(template = name, error = %e, "Template file unavailable, using fallback");
                None
            }
        }
    }

    /// Rejection reply for senders the validation service does not know.
    pub fn unregistered_sender(&self, claim_id: &str, user_email: &str) -> RenderedMail {
        let raw = self
            .load(UNREGISTERED_SENDER_FILE)
            .unwrap_or_else(|| FALLBACK_UNREGISTERED.to_string());
        render(
            &raw,
            "Insurance Claim - Registration Required",
            &[("{claim_id}", claim_id), ("{user_email}", user_email)],
        )
    }

    /// Reply for a PENDING assessment, listing satisfied and missing items.
    pub fn pending_reply(
        &self,
        claim_id: &str,
        user_email: &str,
        satisfied_items: &str,
        missing_items: &str,
    ) -> RenderedMail {
        let raw = self
            .load(PENDING_REPLY_FILE)
            .unwrap_or_else(|| FALLBACK_PENDING.to_string());
        render(
            &raw,
            "Insurance Claim - Additional Information Required",
            &[
                ("{claim_id}", claim_id),
                ("{user_email}", user_email),
                ("{satisfied_items}", satisfied_items),
                ("{missing_items}", missing_items),
            ],
        )
    }

    /// System prompt for the assessment model.
    pub fn system_prompt(&self) -> String {
        self.load(SYSTEM_PROMPT_FILE)
            .unwrap_or_else(|| FALLBACK_SYSTEM_PROMPT.to_string())
    }
}

/// Substitute placeholders and split off the subject line.
fn render(raw: &str, default_subject: &str, substitutions: &[(&str, &str)]) -> RenderedMail {
    let mut text = raw.to_string();
    for (placeholder, value) in substitutions {
        text = text.replace(placeholder, value);
    }
    let (subject, body) = split_subject(&text, default_subject);
    RenderedMail { subject, body }
}

/// If the template starts with `Subject: ...`, use that line as the subject
/// and the rest (minus one leading blank line) as the body.
fn split_subject(text: &str, default_subject: &str) -> (String, String) {
    if text.starts_with("Subject: ")
        && let Some(pos) = text.find('\n')
    {
        let subject = text[9..pos].trim().to_string();
        let body = text[pos + 1..].trim_start_matches('\n').to_string();
        return (subject, body);
    }
    (default_subject.to_string(), text.to_string())
}
