//! Error types for the BIG-IP client

use thiserror::Error;

/// Main error type for the BIG-IP client
#[derive(Error, Debug)]
pub enum BigipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Device returned {status}: {body}")]
    Device { status: u16, body: String },

    #[error("No content to upload: {0}")]
    EmptyContent(String),

    #[error("Malformed command output: {0}")]
    CommandOutput(String),

    #[error("{}", cleanup_display(.cleanup, .install_error))]
    CleanupFailed {
        /// The error raised while deleting the temporary artifact.
        cleanup: Box<BigipError>,
        /// The original install error, when the install itself also failed.
        install_error: Option<Box<BigipError>>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

fn cleanup_display(cleanup: &BigipError, install_error: &Option<Box<BigipError>>) -> String {
    match install_error {
        Some(install) => format!(
            "temporary file cleanup failed: {} (after install failure: {})",
            cleanup, install
        ),
        None => format!("temporary file cleanup failed: {}", cleanup),
    }
}

impl BigipError {
    /// Build a device error from a non-success response status and body.
    pub fn device(status: reqwest::StatusCode, body: String) -> Self {
        BigipError::Device {
            status: status.as_u16(),
            body,
        }
    }
}

/// Outcome of a delete against the device.
///
/// 404 is the sole not-an-error case, applied uniformly across all delete
/// operations so that retry-to-completion is safe.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// The object existed and was removed; carries the response body if the
    /// device returned one.
    Deleted(Option<serde_json::Value>),

    /// The object was not present on the device; nothing to delete.
    AlreadyAbsent,
}

impl DeleteOutcome {
    /// Whether the delete was a no-op because the object was already gone.
    pub fn was_absent(&self) -> bool {
        matches!(self, DeleteOutcome::AlreadyAbsent)
    }
}
