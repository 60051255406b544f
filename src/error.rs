//! Error types for exchange-mail

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid task parameters. Raised before any network
    /// call and never folded into a result envelope.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Graph API returned {status} ({code}): {message}")]
    Graph {
        status: u16,
        code: String,
        message: String,
    },

    #[error("EWS error: {0}")]
    Ews(String),

    #[error("Failed to upload large attachment \"{0}\"")]
    UploadFailed(String),

    #[error("No files found in {0}")]
    AttachmentNotFound(String),

    #[error("No messages found matching the search filter")]
    NoMessagesFound,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid attachment payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl Error {
    /// Whether this error must propagate even when the caller asked
    /// for failures to be collected into the result.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
