//! End-to-end pipeline tests: stub mailbox and collaborators, real
//! extractor, watermark store, orchestrator and poller.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use claim_intake::clients::{NotificationClient, PolicyInfo, RecordStore, ValidationClient};
use claim_intake::error::{ClientError, LlmError, MailError, StorageError};
use claim_intake::ids::FulfillmentId;
use claim_intake::intake::IntakeQueue;
use claim_intake::llm::AssessmentClient;
use claim_intake::llm::provider::PromptPart;
use claim_intake::mail::MailSource;
use claim_intake::mail::extract::MessageExtractor;
use claim_intake::pipeline::Orchestrator;
use claim_intake::pipeline::types::{FulfillmentRecord, FulfillmentStatus};
use claim_intake::poller::Poller;
use claim_intake::storage::{ArtifactStore, ClaimArchiver, ObjectRef};
use claim_intake::templates::TemplateStore;
use claim_intake::watermark::{LibSqlWatermarkStore, WatermarkStore};

// ── Stub mailbox ────────────────────────────────────────────────────

struct StubMailbox {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl StubMailbox {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
        })
    }

    fn deliver(&self, raw: Vec<u8>) {
        let mut messages = self.messages.lock().unwrap();
        let id = format!("{:03}", messages.len() + 1);
        messages.push((id, raw));
    }
}

#[async_trait]
impl MailSource for StubMailbox {
    async fn size(&self) -> Result<u64, MailError> {
        Ok(self.messages.lock().unwrap().len() as u64)
    }

    async fn list_ids(&self) -> Result<Vec<String>, MailError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, MailError> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|(mid, _)| mid == id)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| MailError::Command {
                command: "FETCH".into(),
                reason: format!("no message {id}"),
            })
    }
}

// ── Stub collaborators ──────────────────────────────────────────────

struct Registry {
    registered: HashSet<String>,
}

#[async_trait]
impl ValidationClient for Registry {
    async fn lookup(&self, email: &str) -> Result<Option<PolicyInfo>, ClientError> {
        Ok(self.registered.contains(email).then(|| PolicyInfo {
            id: 1,
            policy_type: "motor".into(),
            policy_issued_date: "2024-01-15".into(),
        }))
    }
}

struct ScriptedAssessor {
    response: String,
    prompts_seen: Mutex<Vec<Vec<PromptPart>>>,
}

#[async_trait]
impl AssessmentClient for ScriptedAssessor {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn assess(
        &self,
        _system_prompt: &str,
        parts: &[PromptPart],
    ) -> Result<String, LlmError> {
        self.prompts_seen.lock().unwrap().push(parts.to_vec());
        Ok(self.response.clone())
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl NotificationClient for Outbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ClientError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.into(), subject.into(), body.into()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordSink {
    created: Mutex<Vec<FulfillmentRecord>>,
}

#[async_trait]
impl RecordStore for RecordSink {
    async fn create(&self, record: &FulfillmentRecord) -> Result<FulfillmentId, ClientError> {
        self.created.lock().unwrap().push(record.clone());
        Ok(FulfillmentId::parse("FULFILL_AB12CD34").unwrap())
    }
}

#[derive(Default)]
struct ObjectSink {
    keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactStore for ObjectSink {
    async fn put_object(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<ObjectRef, StorageError> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(ObjectRef {
            url: format!("https://store.test/dl/{key}"),
            key: key.to_string(),
        })
    }
}

// ── Rig assembly ────────────────────────────────────────────────────

struct Rig {
    mailbox: Arc<StubMailbox>,
    watermarks: Arc<LibSqlWatermarkStore>,
    outbox: Arc<Outbox>,
    records: Arc<RecordSink>,
    objects: Arc<ObjectSink>,
    staging_root: std::path::PathBuf,
    poller: Poller,
    _staging: tempfile::TempDir,
}

async fn rig(registered: &[&str], model_response: &str, with_archiver: bool) -> Rig {
    let mailbox = StubMailbox::new();
    let watermarks = Arc::new(LibSqlWatermarkStore::new_memory().await.unwrap());
    let outbox = Arc::new(Outbox::default());
    let records = Arc::new(RecordSink::default());
    let objects = Arc::new(ObjectSink::default());
    let staging = tempfile::tempdir().unwrap();
    let staging_root = staging.path().to_path_buf();

    let archiver = with_archiver
        .then(|| ClaimArchiver::new(objects.clone() as Arc<dyn ArtifactStore>, "insurance-claims"));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(Registry {
            registered: registered.iter().map(|s| s.to_string()).collect(),
        }),
        Arc::new(ScriptedAssessor {
            response: model_response.to_string(),
            prompts_seen: Mutex::new(Vec::new()),
        }),
        outbox.clone(),
        records.clone(),
        archiver,
        TemplateStore::new("templates"),
        Duration::from_millis(0),
    ));

    let poller = Poller::new(
        mailbox.clone(),
        watermarks.clone(),
        MessageExtractor::new(&staging_root),
        IntakeQueue::new(),
        orchestrator,
    );

    Rig {
        mailbox,
        watermarks,
        outbox,
        records,
        objects,
        staging_root,
        poller,
        _staging: staging,
    }
}

fn plain_mail(sender: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {sender}\r\nSubject: Insurance claim\r\nContent-Type: text/plain\r\n\r\n{body}\r\n"
    )
    .into_bytes()
}

fn mail_with_photo(sender: &str, body: &str) -> Vec<u8> {
    format!(
        concat!(
            "From: {}\r\n",
            "Subject: Insurance claim\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"BOUND\"\r\n",
            "\r\n",
            "--BOUND\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "{}\r\n",
            "--BOUND\r\n",
            "Content-Type: image/jpeg; name=\"damage.jpg\"\r\n",
            "Content-Disposition: attachment; filename=\"damage.jpg\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "/9j/4AAQSkZJRg==\r\n",
            "--BOUND--\r\n",
        ),
        sender, body
    )
    .into_bytes()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn first_run_adopts_backlog_without_processing() {
    let rig = rig(&[], "FULFILLMENT_STATUS: COMPLETED", false).await;
    rig.mailbox.deliver(plain_mail("old@example.com", "ancient claim, $100"));

    let stats = rig.poller.run_cycle().await.unwrap();
    assert_eq!(stats.fetched, 0);
    assert_eq!(stats.processed, 0);

    let wm = rig.watermarks.read_last().await.unwrap().unwrap();
    assert_eq!(wm.count, 1);
    assert!(rig.outbox.sent.lock().unwrap().is_empty());
    assert!(rig.records.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unregistered_sender_gets_rejection_and_no_record() {
    let rig = rig(&[], "FULFILLMENT_STATUS: COMPLETED", false).await;
    rig.mailbox.deliver(plain_mail("old@example.com", "backlog"));
    rig.poller.run_cycle().await.unwrap();

    rig.mailbox
        .deliver(plain_mail("stranger@example.com", "my claim, $500"));
    let stats = rig.poller.run_cycle().await.unwrap();
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.processed, 1);

    let sent = rig.outbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "stranger@example.com");
    assert!(sent[0].1.contains("Registration Required"));
    assert!(rig.records.created.lock().unwrap().is_empty());

    let wm = rig.watermarks.read_last().await.unwrap().unwrap();
    assert_eq!(wm.count, 2);
}

#[tokio::test]
async fn completed_claim_is_archived_persisted_and_cleaned_up() {
    let rig = rig(
        &["alice@example.com"],
        "FULFILLMENT_STATUS: COMPLETED",
        true,
    )
    .await;
    rig.mailbox.deliver(plain_mail("old@example.com", "backlog"));
    rig.poller.run_cycle().await.unwrap();

    rig.mailbox.deliver(mail_with_photo(
        "alice@example.com",
        "My car was hit by a truck on the highway. Repair total: $2500",
    ));
    let stats = rig.poller.run_cycle().await.unwrap();
    assert_eq!(stats.processed, 1);

    let records = rig.records.created.lock().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.fulfillment_status, FulfillmentStatus::Completed);
    assert_eq!(record.user_mail, "alice@example.com");
    assert!(record.mail_content_url.is_some());
    assert_eq!(record.attachment_urls.as_ref().unwrap().len(), 1);
    assert!(record.missing_items.is_none());
    assert!(record.uploaded_at.is_some());

    // Both objects landed under the sender/claim key.
    let keys = rig.objects.keys.lock().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys[0].starts_with("insurance-claims/alice@example.com/claims/CLAIM_"));
    assert!(keys[0].ends_with("/mail_content.txt"));
    assert!(keys[1].contains("/attachments/"));

    // Staged evidence removed after durable archival.
    let leftover: Vec<_> = std::fs::read_dir(&rig.staging_root)
        .map(|d| d.flatten().collect())
        .unwrap_or_default();
    assert!(leftover.is_empty(), "staging root not cleaned: {leftover:?}");

    // No customer notification on the COMPLETED path.
    assert!(rig.outbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pending_claim_persists_local_refs_and_notifies() {
    let rig = rig(
        &["alice@example.com"],
        "FULFILLMENT_STATUS: PENDING\nMISSING_ITEMS:\n- claim amount",
        true,
    )
    .await;
    rig.mailbox.deliver(plain_mail("old@example.com", "backlog"));
    rig.poller.run_cycle().await.unwrap();

    rig.mailbox.deliver(mail_with_photo(
        "alice@example.com",
        "My car was hit by a truck yesterday on the highway.",
    ));
    let stats = rig.poller.run_cycle().await.unwrap();
    assert_eq!(stats.processed, 1);

    let records = rig.records.created.lock().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.fulfillment_status, FulfillmentStatus::Pending);
    assert_eq!(record.missing_items.as_deref(), Some("- claim amount"));
    assert!(record.mail_content_url.is_none());
    assert!(record.attachment_urls.is_none());
    let local = record.local_attachment_paths.as_ref().unwrap();
    assert_eq!(local.len(), 1);
    assert!(local[0].ends_with("_damage.jpg"));

    // Nothing archived on the PENDING path.
    assert!(rig.objects.keys.lock().unwrap().is_empty());

    // Reply lists the missing item and the other satisfied categories.
    let sent = rig.outbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "alice@example.com");
    assert!(sent[0].1.contains("Additional Information Required"));
    assert!(sent[0].2.contains("- claim amount"));
    assert!(sent[0].2.contains("- User email address provided"));
    assert!(sent[0].2.contains("- Reason for claim provided"));
    assert!(sent[0].2.contains("documents provided"));

    // Local evidence stays on disk for the follow-up.
    let claim_dirs: Vec<_> = std::fs::read_dir(&rig.staging_root)
        .unwrap()
        .flatten()
        .collect();
    assert_eq!(claim_dirs.len(), 1);
}

#[tokio::test]
async fn watermark_is_monotonic_across_cycles() {
    let rig = rig(&[], "FULFILLMENT_STATUS: COMPLETED", false).await;

    let mut last = 0;
    for n in 0..4 {
        if n > 0 {
            rig.mailbox
                .deliver(plain_mail("stranger@example.com", "another claim"));
        }
        rig.poller.run_cycle().await.unwrap();
        let wm = rig.watermarks.read_last().await.unwrap().unwrap();
        assert!(wm.count >= last, "watermark decreased: {} < {last}", wm.count);
        last = wm.count;
    }
    assert_eq!(last, 3);
}
