//! Claim processing pipeline — types, prompt assembly, decision parsing,
//! and the orchestrating state machine.

pub mod decision;
pub mod orchestrator;
pub mod prompt;
pub mod types;

pub use orchestrator::Orchestrator;
pub use types::{Assessment, ClaimOutcome, FulfillmentRecord, FulfillmentStatus, QueuedMessage};
