//! Configuration types, built from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

/// Mailbox connection configuration.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: String,
    pub mailbox: String,
}

impl MailboxConfig {
    /// Build config from environment variables.
    /// Returns `None` if `CLAIM_IMAP_HOST` is not set (ingestion disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("CLAIM_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("CLAIM_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let username = std::env::var("CLAIM_IMAP_USERNAME").unwrap_or_default();
        let password = std::env::var("CLAIM_IMAP_PASSWORD").unwrap_or_default();
        let mailbox = std::env::var("CLAIM_IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".to_string());

        Some(Self {
            imap_host,
            imap_port,
            username,
            password,
            mailbox,
        })
    }
}

/// Pipeline pacing and filesystem configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Poll cycle interval in seconds.
    pub poll_interval_secs: u64,
    /// Delay after each processed message, to pace downstream collaborators.
    pub process_delay_secs: u64,
    /// Root directory for staged attachment files.
    pub staging_root: PathBuf,
    /// Directory holding reply/prompt template files.
    pub templates_dir: PathBuf,
    /// Path of the local watermark database file.
    pub watermark_db_path: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let poll_interval_secs: u64 = std::env::var("CLAIM_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let process_delay_secs: u64 = std::env::var("CLAIM_PROCESS_DELAY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let staging_root = std::env::var("CLAIM_STAGING_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("attachments"));

        let templates_dir = std::env::var("CLAIM_TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("templates"));

        let watermark_db_path = std::env::var("CLAIM_WATERMARK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/claim-intake.db"));

        Self {
            poll_interval_secs,
            process_delay_secs,
            staging_root,
            templates_dir,
            watermark_db_path,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            process_delay_secs: 1,
            staging_root: PathBuf::from("attachments"),
            templates_dir: PathBuf::from("templates"),
            watermark_db_path: PathBuf::from("data/claim-intake.db"),
        }
    }
}

/// Base URLs for the three request/response collaborator services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub validation_url: String,
    pub notification_url: String,
    pub record_store_url: String,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            validation_url: std::env::var("CLAIM_VALIDATION_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            notification_url: std::env::var("CLAIM_NOTIFICATION_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            record_store_url: std::env::var("CLAIM_RECORD_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
        }
    }
}

/// Artifact store (object gateway) configuration.
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub gateway_url: String,
    /// Key prefix under which claim bundles are archived.
    pub prefix: String,
    pub token: SecretString,
}

impl ArtifactConfig {
    /// Returns `None` if `CLAIM_ARTIFACT_URL` is not set (archival disabled).
    pub fn from_env() -> Option<Self> {
        let gateway_url = std::env::var("CLAIM_ARTIFACT_URL").ok()?;

        let prefix = std::env::var("CLAIM_ARTIFACT_PREFIX")
            .unwrap_or_else(|_| "insurance-claims".to_string());

        let token =
            SecretString::from(std::env::var("CLAIM_ARTIFACT_TOKEN").unwrap_or_default());

        Some(Self {
            gateway_url,
            prefix,
            token,
        })
    }
}

/// Staging-directory sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Sweep interval in seconds.
    pub interval_secs: u64,
    /// Claim directories older than this many hours are deleted.
    pub retention_hours: u64,
}

impl SweeperConfig {
    pub fn from_env() -> Self {
        let interval_secs: u64 = std::env::var("CLAIM_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let retention_hours: u64 = std::env::var("CLAIM_RETENTION_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24);

        Self {
            interval_secs,
            retention_hours,
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            retention_hours: 24,
        }
    }
}
