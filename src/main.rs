use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use claim_intake::clients::{HttpNotificationClient, HttpRecordStore, HttpValidationClient};
use claim_intake::config::{
    ArtifactConfig, MailboxConfig, PipelineConfig, ServiceConfig, SweeperConfig,
};
use claim_intake::intake::IntakeQueue;
use claim_intake::llm::{LlmBackend, LlmConfig, create_assessor};
use claim_intake::mail::ImapMailSource;
use claim_intake::mail::extract::MessageExtractor;
use claim_intake::pipeline::Orchestrator;
use claim_intake::poller::{Poller, spawn_poller};
use claim_intake::storage::{ClaimArchiver, HttpArtifactStore};
use claim_intake::sweeper::{Sweeper, spawn_sweeper};
use claim_intake::templates::TemplateStore;
use claim_intake::watermark::LibSqlWatermarkStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ── LLM backend ─────────────────────────────────────────────────────
    let backend = match std::env::var("CLAIM_LLM_BACKEND").as_deref() {
        Ok("openai") => LlmBackend::OpenAi,
        _ => LlmBackend::Anthropic,
    };

    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key = std::env::var(key_var).unwrap_or_else(|_| {
        eprintln!("Error: {key_var} not set");
        std::process::exit(1);
    });

    let model = std::env::var("CLAIM_MODEL")
        .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

    let temperature: f64 = std::env::var("CLAIM_LLM_TEMPERATURE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.3);

    let max_tokens: u64 = std::env::var("CLAIM_LLM_MAX_TOKENS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1500);

    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model: model.clone(),
        temperature,
        max_tokens,
    };

    // ── Configuration ───────────────────────────────────────────────────
    let pipeline_config = PipelineConfig::from_env();
    let services = ServiceConfig::from_env();
    let sweeper_config = SweeperConfig::from_env();
    let artifact_config = ArtifactConfig::from_env();

    let Some(mailbox_config) = MailboxConfig::from_env() else {
        eprintln!("Error: CLAIM_IMAP_HOST not set");
        eprintln!("  export CLAIM_IMAP_HOST=imap.example.com");
        std::process::exit(1);
    };

    eprintln!("📬 Claim Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!(
        "   Mailbox: {}:{} ({})",
        mailbox_config.imap_host, mailbox_config.imap_port, mailbox_config.mailbox
    );
    eprintln!("   Validation: {}", services.validation_url);
    eprintln!("   Notification: {}", services.notification_url);
    eprintln!("   Record store: {}", services.record_store_url);
    eprintln!(
        "   Archival: {}",
        artifact_config
            .as_ref()
            .map(|c| c.gateway_url.as_str())
            .unwrap_or("disabled")
    );
    eprintln!(
        "   Poll every {}s, sweep every {}s (retention {}h)\n",
        pipeline_config.poll_interval_secs,
        sweeper_config.interval_secs,
        sweeper_config.retention_hours
    );

    // ── Collaborators ───────────────────────────────────────────────────
    let assessor = create_assessor(&llm_config)?;

    let watermarks = Arc::new(
        LibSqlWatermarkStore::new_local(&pipeline_config.watermark_db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open watermark database at {}: {}",
                    pipeline_config.watermark_db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    let validation = Arc::new(HttpValidationClient::new(services.validation_url));
    let notifier = Arc::new(HttpNotificationClient::new(services.notification_url));
    let records = Arc::new(HttpRecordStore::new(services.record_store_url));

    let archiver = artifact_config.map(|config| {
        let prefix = config.prefix.clone();
        ClaimArchiver::new(Arc::new(HttpArtifactStore::new(config)), prefix)
    });

    let templates = TemplateStore::new(&pipeline_config.templates_dir);

    // ── Pipeline ────────────────────────────────────────────────────────
    let orchestrator = Arc::new(Orchestrator::new(
        validation,
        assessor,
        notifier,
        records,
        archiver,
        templates,
        Duration::from_secs(pipeline_config.process_delay_secs),
    ));

    let source = Arc::new(ImapMailSource::new(mailbox_config));
    let poller = Arc::new(Poller::new(
        source,
        watermarks,
        MessageExtractor::new(&pipeline_config.staging_root),
        IntakeQueue::new(),
        orchestrator,
    ));

    let (poll_handle, poll_shutdown) = spawn_poller(
        poller,
        Duration::from_secs(pipeline_config.poll_interval_secs),
    );

    let (sweep_handle, sweep_shutdown) = spawn_sweeper(
        Sweeper::new(&pipeline_config.staging_root, &sweeper_config),
        Duration::from_secs(sweeper_config.interval_secs),
    );

    // ── Shutdown ────────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, finishing current cycle before exit");
    poll_shutdown.store(true, Ordering::Relaxed);
    sweep_shutdown.store(true, Ordering::Relaxed);

    // The poller observes the flag between cycles; in-flight collaborator
    // calls complete first. The sweeper's long interval makes waiting on
    // its next tick pointless.
    let _ = poll_handle.await;
    sweep_handle.abort();

    Ok(())
}
