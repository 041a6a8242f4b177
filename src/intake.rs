//! Intake queue — lock-guarded FIFO of extracted messages.
//!
//! Producer (poll-cycle fetch phase) and consumer (orchestrator drain) never
//! run concurrently in the current single-worker design; the lock makes the
//! hand-off safe if fetch and processing are ever parallelized.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::pipeline::types::QueuedMessage;

/// FIFO buffer of messages gathered in one fetch phase.
pub struct IntakeQueue {
    messages: Mutex<VecDeque<QueuedMessage>>,
}

impl IntakeQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(VecDeque::new()),
        })
    }

    /// Append a message to the back of the queue.
    pub async fn push(&self, message: QueuedMessage) {
        let mut messages = self.messages.lock().await;
        messages.push_back(message);
        debug!(
            claim_id = %messages.back().map(|m| m.claim_id.as_str()).unwrap_or(""),
            queue_len = messages.len(),
            "Message enqueued"
        );
    }

    /// Take the oldest message, or `None` when drained.
    pub async fn pop(&self) -> Option<QueuedMessage> {
        self.messages.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ids::ClaimId;

    fn message(n: u32) -> QueuedMessage {
        QueuedMessage {
            message_id: n.to_string(),
            sender_email: "alice@example.com".into(),
            subject: format!("Claim {n}"),
            body: "body".into(),
            claim_id: ClaimId::mint(),
            attachment_paths: vec![],
            attachment_count: 0,
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fifo_order_preserved() {
        let queue = IntakeQueue::new();
        queue.push(message(1)).await;
        queue.push(message(2)).await;
        queue.push(message(3)).await;

        assert_eq!(queue.len().await, 3);
        assert_eq!(queue.pop().await.unwrap().message_id, "1");
        assert_eq!(queue.pop().await.unwrap().message_id, "2");
        assert_eq!(queue.pop().await.unwrap().message_id, "3");
        assert!(queue.pop().await.is_none());
        assert!(queue.is_empty().await);
    }
}
