use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::watch;

use crate::error::BackendError;
use crate::kv::{KvPair, KvPairs, WatchResponse};

/// Options for read requests against a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Access token forwarded to the store, if configured
    pub token: Option<String>,
    /// Block until the store's index moves past this value
    pub wait_index: Option<u64>,
    /// Upper bound on how long the store may block a long-poll
    pub wait_time: Option<Duration>,
}

/// Options for write requests against a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Access token forwarded to the store, if configured
    pub token: Option<String>,
}

/// Metadata returned alongside a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Change index of the store state the read observed
    pub last_index: u64,
}

/// Raw access to a remote key-value store with long-poll reads.
///
/// Implementations surface transport and store failures as
/// `BackendError::Store` and report missing keys as `Ok(None)`, never as
/// an error; turning absence into `NotFound` is the adapter's job.
#[async_trait]
pub trait StoreAccessor: Send + Sync + 'static {
    /// Read a single entry.
    ///
    /// When `opts.wait_index` is set, blocks until the key changed past that
    /// index or the store's wait time elapses, then returns the current
    /// entry and the new index.
    async fn get_entry(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> Result<(Option<KvPair>, QueryMeta), BackendError>;

    /// List every entry under a prefix, in store order.
    async fn list_entries(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> Result<KvPairs, BackendError>;

    /// Write a single entry.
    async fn put_entry(&self, entry: &KvPair, opts: &WriteOptions) -> Result<(), BackendError>;
}

/// Stream of watch responses. Ends only when the watch is stopped.
pub type WatchStream = Pin<Box<dyn Stream<Item = WatchResponse> + Send>>;

/// Uniform configuration backend interface.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    /// Returns the backend identifier (e.g., "consul").
    fn backend_name(&self) -> &'static str;

    /// Get the value stored at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError>;

    /// List all pairs under `prefix`. No matches is an empty list.
    async fn list(&self, prefix: &str) -> Result<KvPairs, BackendError>;

    /// Store `value` at `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Watch `key` for changes until `stop` turns `true` or its sender is dropped.
    ///
    /// Must be called from within a tokio runtime.
    fn watch(&self, key: &str, stop: watch::Receiver<bool>) -> WatchStream;
}
