use thiserror::Error;

/// Errors that can occur in a configuration backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("key ( {0} ) was not found")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Construction error: {0}")]
    Construction(String),
}

impl BackendError {
    /// Whether this error reports a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}
