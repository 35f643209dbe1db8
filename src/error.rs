//! Error types for event-relay.

/// Configuration-related errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid keyword {keyword:?}: {reason}")]
    InvalidKeyword { keyword: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Channel (transport) errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Invalid response from channel {name}: {reason}")]
    InvalidResponse { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

impl ChannelError {
    /// True when the identity behind the channel has been rejected for good.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ChannelError::AuthFailed { .. })
    }
}

/// Errors raised while polling one source.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The fetch collaborator failed for this source; retried next sweep.
    #[error("Fetch failed for source {source_id}: {reason}")]
    Fetch { source_id: String, reason: String },

    /// The fetching identity is permanently unusable; stops the scheduler.
    #[error("Fetching identity revoked: {reason}")]
    IdentityRevoked { reason: String },

    #[error("Offset store failed for source {source_id}: {reason}")]
    Offset { source_id: String, reason: String },

    #[error("Recipient store failed for source {source_id}: {reason}")]
    Recipients { source_id: String, reason: String },
}

impl PollError {
    /// Whether this error must terminate the scheduler instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PollError::IdentityRevoked { .. })
    }
}
