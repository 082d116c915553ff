use std::io;

/// Custom error type for jenkins_notify operations
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown clone type '{0}'")]
    UnknownCloneType(String),

    #[error("Clone URL resolution failed: {0}")]
    CloneUrlResolution(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;
