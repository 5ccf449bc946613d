//! Error types for the inbox agent.

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
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

/// Persistence-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Mailbox transport errors (IMAP list/fetch/flag, SMTP send).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("Authentication failed for {user}")]
    Auth { user: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Send to {recipient} failed: {reason}")]
    SendFailed { recipient: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reply-generation errors. Always recoverable via the template fallback.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    #[error("Empty response from generator")]
    EmptyResponse,
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
