use thiserror::Error;

/// Application error taxonomy. Commands flatten these to plain strings for
/// the UI; the messages are written to be shown in a toast or alert as-is.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{0}")]
    Validation(String),

    #[error("Check your internet connection and try again.")]
    Connection,

    #[error("{0} not found.")]
    NotFound(String),

    #[error("Platform error ({status}): {message}")]
    Platform { status: u16, message: String },

    #[error("{0}")]
    Storage(String),

    #[error("OCR failed: {0}")]
    Recognition(String),

    #[error("{0} not set in .env")]
    MissingConfig(&'static str),
}

impl WorkspaceError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkspaceError::Validation(message.into())
    }

    /// Translate a transport error into a user-facing message, collapsing
    /// connect/timeout failures into one actionable hint.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            WorkspaceError::Connection
        } else {
            WorkspaceError::Platform {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: "Network error.".to_string(),
            }
        }
    }
}

impl From<rusqlite::Error> for WorkspaceError {
    fn from(err: rusqlite::Error) -> Self {
        WorkspaceError::Storage(err.to_string())
    }
}
