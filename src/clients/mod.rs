//! HTTP collaborator clients — user validation, notification, record store.
//!
//! Each collaborator sits behind an object-safe trait so the orchestrator
//! can be constructed with test doubles.

pub mod notification;
pub mod records;
pub mod validation;

pub use notification::{HttpNotificationClient, NotificationClient};
pub use records::{HttpRecordStore, RecordStore};
pub use validation::{HttpValidationClient, PolicyInfo, ValidationClient};
