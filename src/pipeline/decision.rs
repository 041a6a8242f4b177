//! Decision parser — extracts a fulfillment decision from free-form model
//! output.
//!
//! The model is asked to follow a marker grammar
//! (`FULFILLMENT_STATUS: COMPLETED|PENDING`, then a `MISSING_ITEMS:` block),
//! but nothing enforces it upstream. Anything unparseable defaults to
//! PENDING; unparseable output is never treated as complete. A failsafe
//! override corrects the opposite false negative: a model that reports
//! PENDING while having nothing concrete to list as missing.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::pipeline::types::{Assessment, FulfillmentStatus, QueuedMessage};
use crate::templates::TemplateStore;

/// Placeholder when PENDING output carries no `MISSING_ITEMS:` block.
pub const GENERIC_MISSING_PLACEHOLDER: &str = "- Required fulfillment items missing";

/// Bullet line for the always-satisfied sender signal.
const SENDER_SATISFIED: &str = "- User email address provided";
const REASON_SATISFIED: &str = "- Reason for claim provided";
const AMOUNT_SATISFIED: &str = "- Claim amount specified";

/// Keywords whose presence in the missing-items text marks the claim
/// reason as still outstanding.
const REASON_KEYWORDS: &[&str] = &[
    "reason",
    "description",
    "what happened",
    "incident",
    "cause",
    "explain",
];

/// Keywords whose presence in the missing-items text marks the claim
/// amount as still outstanding.
const AMOUNT_KEYWORDS: &[&str] = &[
    "amount",
    "dollar",
    "cost",
    "money",
    "price",
    "value",
    "sum",
    "total",
    "claim",
    "damage",
    "bill",
    "specific claim amount",
    "currency",
];

/// Keywords whose presence in the missing-items text marks supporting
/// proof as still outstanding.
const PROOF_KEYWORDS: &[&str] = &[
    "proof",
    "document",
    "attachment",
    "evidence",
    "support",
    "bill",
    "receipt",
    "photo",
    "police report",
    "medical",
];

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FULFILLMENT_STATUS:\s*(COMPLETED|PENDING)").unwrap());

static MISSING_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)MISSING_ITEMS:\s*(.*?)(?:\n\n|FULFILLMENT_STATUS:|\z)").unwrap()
});

/// Monetary patterns scanned against the lowercased body: currency symbols,
/// labeled numeric fields, and any 3+-digit grouped number.
static MONETARY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$\s*[\d,]+",
        r"rs\.?\s*[\d,]+",
        r"inr\s*[\d,]+",
        r"usd\s*[\d,]+",
        r"amount:?\s*[\d,]+",
        r"cost:?\s*[\d,]+",
        r"claim:?\s*[\d,]+",
        r"damage:?\s*[\d,]+",
        r"total:?\s*[\d,]+",
        r"\d[\d,]{2,}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Does the message body itself carry a monetary value?
///
/// This is a second, body-derived amount signal that can mark the amount
/// satisfied even when the model's missing-items text is ambiguous.
pub fn body_has_monetary_signal(body: &str) -> bool {
    let lower = body.to_lowercase();
    MONETARY_RES.iter().any(|re| re.is_match(&lower))
}

/// Parses raw assessment output into a final `Assessment`.
pub struct DecisionParser {
    templates: TemplateStore,
}

impl DecisionParser {
    pub fn new(templates: TemplateStore) -> Self {
        Self { templates }
    }

    /// Extract status and item lists from the raw model response.
    pub fn parse(&self, raw: &str, message: &QueuedMessage) -> Assessment {
        let model_status = match STATUS_RE.captures(raw).map(|c| c[1].to_string()) {
            Some(s) if s == "COMPLETED" => FulfillmentStatus::Completed,
            Some(_) => FulfillmentStatus::Pending,
            None => {
                debug!(claim_id = %message.claim_id, "No status marker in model output, defaulting to PENDING");
                FulfillmentStatus::Pending
            }
        };

        // A model-reported COMPLETED is never second-guessed.
        if model_status == FulfillmentStatus::Completed {
            return Assessment {
                status: FulfillmentStatus::Completed,
                missing_items: String::new(),
                satisfied_items: completed_satisfied_items(message.attachment_count),
                reply_body: String::new(),
            };
        }

        let missing_items = extract_missing_items(raw);
        let satisfied_items = identify_satisfied_items(message, &missing_items);

        // Failsafe: all four signals satisfied and nothing concrete listed
        // as missing means the PENDING was a false negative.
        if satisfied_items.len() >= 4
            && (missing_items.trim().is_empty() || missing_items == GENERIC_MISSING_PLACEHOLDER)
        {
            info!(
                claim_id = %message.claim_id,
                "Failsafe activated: all requirements satisfied, overriding PENDING to COMPLETED"
            );
            return Assessment {
                status: FulfillmentStatus::Completed,
                missing_items: String::new(),
                satisfied_items: Vec::new(),
                reply_body: String::new(),
            };
        }

        let satisfied_text = if satisfied_items.is_empty() {
            "None identified".to_string()
        } else {
            satisfied_items.join("\n")
        };
        let reply = self.templates.pending_reply(
            message.claim_id.as_str(),
            &message.sender_email,
            &satisfied_text,
            &missing_items,
        );

        Assessment {
            status: FulfillmentStatus::Pending,
            missing_items,
            satisfied_items,
            reply_body: reply.body,
        }
    }
}

/// Capture the `MISSING_ITEMS:` block and normalize each line to a bullet.
fn extract_missing_items(raw: &str) -> String {
    let Some(captures) = MISSING_BLOCK_RE.captures(raw) else {
        return GENERIC_MISSING_PLACEHOLDER.to_string();
    };

    let block = captures[1].trim();
    let lines: Vec<String> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            if l.starts_with('-') {
                l.to_string()
            } else {
                format!("- {l}")
            }
        })
        .collect();

    if lines.is_empty() {
        GENERIC_MISSING_PLACEHOLDER.to_string()
    } else {
        lines.join("\n")
    }
}

/// Infer which requirement categories are satisfied.
///
/// A category counts as satisfied when its keywords are absent from the
/// missing-items text; the amount category additionally accepts the
/// body-derived monetary signal.
fn identify_satisfied_items(message: &QueuedMessage, missing_items: &str) -> Vec<String> {
    let missing_lower = missing_items.to_lowercase();
    let mut satisfied = Vec::new();

    // The sender address always exists (they sent the message).
    satisfied.push(SENDER_SATISFIED.to_string());

    if !contains_any(&missing_lower, REASON_KEYWORDS) {
        satisfied.push(REASON_SATISFIED.to_string());
    }

    if !contains_any(&missing_lower, AMOUNT_KEYWORDS) || body_has_monetary_signal(&message.body) {
        satisfied.push(AMOUNT_SATISFIED.to_string());
    }

    if message.attachment_count > 0 {
        if !contains_any(&missing_lower, PROOF_KEYWORDS) {
            satisfied.push(format!(
                "- Supporting documents provided ({} attachments)",
                message.attachment_count
            ));
        } else {
            satisfied.push(format!(
                "- Some documents provided ({} attachments, additional may be needed)",
                message.attachment_count
            ));
        }
    }

    satisfied
}

/// Fully populated satisfied list for a model-reported COMPLETED.
fn completed_satisfied_items(attachment_count: usize) -> Vec<String> {
    vec![
        SENDER_SATISFIED.to_string(),
        REASON_SATISFIED.to_string(),
        AMOUNT_SATISFIED.to_string(),
        format!("- Supporting documents provided ({attachment_count} attachments)"),
    ]
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}
