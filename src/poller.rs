//! Ingestion poller — the poll-and-drain cycle.
//!
//! One cycle: read the stored watermark, compare against the live mailbox
//! size, fetch and extract exactly the new tail of the id listing, enqueue,
//! persist the new watermark, then drain the queue through the
//! orchestrator. The watermark advances only after fetch-and-enqueue
//! completes, so a partial failure re-fetches the same delta next cycle
//! (at-least-once, not exactly-once).
//!
//! Single logical worker: cycles never overlap and the queue is fully
//! drained before the loop sleeps again. Shutdown is observed between
//! cycles, never mid-call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::intake::IntakeQueue;
use crate::mail::MailSource;
use crate::mail::extract::MessageExtractor;
use crate::pipeline::Orchestrator;
use crate::watermark::{Delta, WatermarkStore, compute_delta};

/// Counters from one poll-and-drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Messages fetched and enqueued this cycle.
    pub fetched: usize,
    /// Messages fully processed by the orchestrator this cycle.
    pub processed: usize,
}

/// Owns one poll-and-drain pipeline instance.
///
/// Running more than one poller against the same mailbox and watermark
/// store duplicates processing; there is no leasing or leader election.
pub struct Poller {
    source: Arc<dyn MailSource>,
    watermarks: Arc<dyn WatermarkStore>,
    extractor: MessageExtractor,
    queue: Arc<IntakeQueue>,
    orchestrator: Arc<Orchestrator>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn MailSource>,
        watermarks: Arc<dyn WatermarkStore>,
        extractor: MessageExtractor,
        queue: Arc<IntakeQueue>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            source,
            watermarks,
            extractor,
            queue,
            orchestrator,
        }
    }

    /// Run one complete cycle. An `Err` leaves the watermark unchanged so
    /// the next cycle recomputes the same delta.
    pub async fn run_cycle(&self) -> Result<CycleStats, Error> {
        let current = self.source.size().await?;
        let stored = self.watermarks.read_last().await?;

        match compute_delta(stored.as_ref(), current) {
            Delta::Bootstrap => {
                info!(
                    mailbox_size = current,
                    "First run: initializing watermark without processing existing backlog"
                );
                self.watermarks.append(current, Utc::now()).await?;
                Ok(CycleStats::default())
            }
            Delta::UpToDate => {
                debug!(mailbox_size = current, "No new messages");
                Ok(CycleStats::default())
            }
            Delta::NewMessages { delta } => {
                info!(delta, mailbox_size = current, "Found new messages");
                let fetched = self.fetch_and_enqueue(delta).await?;
                self.watermarks.append(current, Utc::now()).await?;

                let processed = self.orchestrator.drain(&self.queue).await;
                Ok(CycleStats { fetched, processed })
            }
        }
    }

    /// Fetch the last `delta` ids, extract each, and enqueue.
    ///
    /// A transport-level fetch failure aborts the cycle (the watermark
    /// stays put, so the delta is re-fetched next cycle). Extraction
    /// failures on individual messages are logged and skipped.
    async fn fetch_and_enqueue(&self, delta: u64) -> Result<usize, Error> {
        let ids = self.source.list_ids().await?;
        let tail_start = ids.len().saturating_sub(delta as usize);
        let new_ids = &ids[tail_start..];

        let mut fetched = 0;
        for id in new_ids {
            let raw = self.source.fetch(id).await?;
            match self.extractor.extract(id, &raw) {
                Ok(message) => {
                    self.queue.push(message).await;
                    fetched += 1;
                }
                Err(e) => {
                    warn!(message_id = %id, error = %e, "Extraction failed, skipping message");
                }
            }
        }
        Ok(fetched)
    }
}

/// Spawn the poll loop on a fixed interval.
///
/// Returns a `JoinHandle` and a shutdown flag. Setting the flag stops the
/// loop at the next tick; in-flight work finishes first.
pub fn spawn_poller(poller: Arc<Poller>, interval: Duration) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Ingestion poller started, polling every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Ingestion poller shutting down");
                return;
            }

            match poller.run_cycle().await {
                Ok(stats) if stats.fetched > 0 => {
                    info!(
                        fetched = stats.fetched,
                        processed = stats.processed,
                        "Poll cycle complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Poll cycle failed, will retry next interval");
                }
            }
        }
    });

    (handle, shutdown_flag)
}
