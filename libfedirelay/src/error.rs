//! Error types for fedirelay

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::Config(_) => 2,
            RelayError::Platform(PlatformError::Authentication(_)) => 2,
            RelayError::Source(SourceError::Authentication(_)) => 2,
            RelayError::Platform(_) => 1,
            RelayError::Media(_) => 1,
            RelayError::Source(_) => 1,
            RelayError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A mapping names an account that has no `[[mastodon.accounts]]` entry
    #[error("Account '{account}' mapped from channel '{channel}' is not defined in mastodon.accounts")]
    UnknownAccount { channel: String, account: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Media upload failed: {0}")]
    Media(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Telegram authentication failed: {0}")]
    Authentication(String),

    #[error("Telegram request failed: {0}")]
    Telegram(String),

    #[error("Cannot access channel '{channel}': {reason}")]
    Channel { channel: String, reason: String },
}
