//! Error types for the claim intake pipeline.

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Collaborator error: {0}")]
    Client(#[from] ClientError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Watermark persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Mailbox access and extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("IMAP connection failed: {0}")]
    Connect(String),

    #[error("IMAP login failed for {user}")]
    Login { user: String },

    #[error("IMAP command {command} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Message {id} could not be parsed")]
    Unparseable { id: String },

    #[error("Failed to stage attachment {name}: {reason}")]
    Staging { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the HTTP collaborator services
/// (user validation, notification, record store).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

/// Assessment model errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Artifact store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact store authentication failed: {0}")]
    Auth(String),

    #[error("Upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("Invalid gateway response for {key}: {reason}")]
    InvalidResponse { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation step failed: {0}")]
    Validation(String),

    #[error("Assessment step failed: {0}")]
    Assessment(String),

    #[error("Notification step failed: {0}")]
    Notification(String),

    #[error("Record persistence failed: {0}")]
    Persistence(String),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
