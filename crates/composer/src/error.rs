//! Composer error types.

use thiserror::Error;

/// Errors raised by the editor lifecycle and the tool registry.
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("editor not ready")]
    EditorNotReady,

    #[error("editor destroyed")]
    EditorDestroyed,

    #[error("editor initialization failed")]
    Initialization(#[source] anyhow::Error),

    #[error("tool '{tool}' is misconfigured: {reason}")]
    ToolConfig { tool: String, reason: String },

    #[error("block {index} ({tool}): {message}")]
    Block {
        index: usize,
        tool: String,
        message: String,
    },

    #[error("editor surface failed to save")]
    Save(#[source] anyhow::Error),
}

impl ComposerError {
    pub(crate) fn tool_config(tool: &str, reason: impl Into<String>) -> Self {
        ComposerError::ToolConfig {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error ends the authoring session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ComposerError::Initialization(_) | ComposerError::ToolConfig { .. }
        )
    }
}

/// Errors raised by the upload adapter. They belong to the block that asked
/// for the upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,

    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("not an http(s) url: {0}")]
    InvalidUrl(String),

    #[error("no uploader configured")]
    NoUploader,

    #[error("upload request failed")]
    Transport(#[from] reqwest::Error),

    #[error("upload rejected with status {0}")]
    Status(u16),

    #[error("upload response did not include a file url")]
    MissingUrl,
}

/// Errors raised by the submission transport.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission request failed")]
    Transport(#[from] reqwest::Error),

    #[error("submission rejected with status {status}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias using ComposerError.
pub type ComposerResult<T> = Result<T, ComposerError>;
