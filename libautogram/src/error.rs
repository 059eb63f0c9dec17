//! Error types for Autogram

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutogramError>;

#[derive(Error, Debug)]
pub enum AutogramError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AutogramError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AutogramError::InvalidInput(_) => 3,
            AutogramError::Publish(PublishError::CredentialsNotFound(_)) => 2,
            AutogramError::Publish(PublishError::TokenExpired(_)) => 2,
            AutogramError::Publish(_) => 1,
            AutogramError::Generation(_) => 1,
            AutogramError::Config(_) => 1,
            AutogramError::Database(_) => 1,
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
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures while driving a post through the Graph API publish protocol.
///
/// The scheduler treats `Transient` and `Terminal` identically for retry
/// accounting (both consume budget); they differ only in log detail.
/// `TokenExpired` is the exception: it never consumes retry budget because
/// refreshing the token is an external concern.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Instagram credentials not found for user {0}")]
    CredentialsNotFound(String),

    #[error("Instagram access token expired for user {0}")]
    TokenExpired(String),

    #[error("Content rejected: {0}")]
    Content(String),

    #[error("Transient remote error: {0}")]
    Transient(String),

    #[error("Remote platform error: {0}")]
    Terminal(String),
}

impl PublishError {
    /// Whether this failure should count against the post's retry budget.
    pub fn consumes_retry_budget(&self) -> bool {
        !matches!(self, PublishError::TokenExpired(_))
    }
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("Caption generation failed: {0}")]
    Caption(String),

    #[error("Image generation failed: {0}")]
    Image(String),

    #[error("Image upload failed: {0}")]
    Upload(String),
}
