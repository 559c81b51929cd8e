//! Client error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
///
/// Calendar and weather lookups never fail at this level; they degrade to
/// empty output. These variants cover what the user can fix: a bad config
/// file, missing credentials, unwritable output.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Config file could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Provider error.
    #[error(transparent)]
    Provider(#[from] dayboard_providers::ProviderError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be rendered.
    #[error("failed to render output: {0}")]
    Render(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Render(err.to_string())
    }
}
