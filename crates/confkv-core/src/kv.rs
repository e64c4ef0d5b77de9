use crate::error::BackendError;

/// A key and its value at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered result of a prefix listing, in store order.
pub type KvPairs = Vec<KvPair>;

/// One item of a watch stream.
///
/// Exactly one of `value` / `error` is set. Errors are not terminal: the
/// watch keeps retrying and the consumer decides what a failure means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchResponse {
    pub value: Option<Vec<u8>>,
    pub error: Option<BackendError>,
}

impl WatchResponse {
    pub fn value(value: Vec<u8>) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            value: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Collapse into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<Vec<u8>, BackendError> {
        match (self.value, self.error) {
            (_, Some(err)) => Err(err),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(Vec::new()),
        }
    }
}
