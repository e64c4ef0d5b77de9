use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confkv_core::{
    BackendError, ConfigBackend, KvPair, KvPairs, QueryOptions, StoreAccessor, WatchStream,
    WriteOptions,
};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument};

use crate::accessor::{ConsulAccessor, DEFAULT_ADDRESS};
use crate::config::ClientConfig;
use crate::watch::WatchLoop;

/// Configuration backend over a long-poll capable key-value store.
///
/// Get, list and set are single requests forwarded to the accessor with the
/// configured token. Each call to `watch` spawns its own long-poll task with
/// its own change-index cursor, so concurrent watches never share state.
pub struct WatchingKvClient<A: StoreAccessor = ConsulAccessor> {
    accessor: Arc<A>,
    token: Option<String>,
    retry_delay: Duration,
    watch_buffer: usize,
    wait_time: Option<Duration>,
    last_index: Arc<AtomicU64>,
}

impl WatchingKvClient<ConsulAccessor> {
    /// Connect to the first endpoint in `config` (or the local agent when none is given).
    pub fn connect(config: ClientConfig) -> Result<Self, BackendError> {
        let address = config.primary_endpoint().unwrap_or(DEFAULT_ADDRESS).to_string();
        let accessor = ConsulAccessor::new(&address)?;
        info!(
            "Consul KV client for {} (token {})",
            accessor.base_url(),
            if config.token.is_some() { "set" } else { "unset" }
        );
        Ok(Self::with_accessor(accessor, config))
    }
}

impl<A: StoreAccessor> WatchingKvClient<A> {
    /// Build a client around an existing accessor. Endpoints in `config` are ignored.
    pub fn with_accessor(accessor: A, config: ClientConfig) -> Self {
        Self {
            accessor: Arc::new(accessor),
            token: config.token,
            retry_delay: config.retry_delay,
            // mpsc::channel panics on zero capacity
            watch_buffer: config.watch_buffer.max(1),
            wait_time: config.wait_time,
            last_index: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    /// Highest change index observed by any watch on this client (0 before any).
    ///
    /// Never decreases, even when watches on different keys report lower indexes.
    pub fn last_index(&self) -> u64 {
        self.last_index.load(Ordering::Acquire)
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            token: self.token.clone(),
            ..Default::default()
        }
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            token: self.token.clone(),
        }
    }

    /// Strip one leading separator. Only writes are normalized.
    fn normalize_key(key: &str) -> &str {
        key.strip_prefix('/').unwrap_or(key)
    }
}

#[async_trait]
impl<A: StoreAccessor> ConfigBackend for WatchingKvClient<A> {
    fn backend_name(&self) -> &'static str {
        "consul"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        let (entry, _) = self.accessor.get_entry(key, &self.query_options()).await?;
        entry
            .map(|e| e.value)
            .ok_or_else(|| BackendError::NotFound(key.to_string()))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, prefix: &str) -> Result<KvPairs, BackendError> {
        self.accessor
            .list_entries(prefix, &self.query_options())
            .await
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        let entry = KvPair::new(Self::normalize_key(key), value);
        self.accessor.put_entry(&entry, &self.write_options()).await?;
        debug!("Stored {} ({} bytes)", entry.key, entry.value.len());
        Ok(())
    }

    fn watch(&self, key: &str, stop: watch::Receiver<bool>) -> WatchStream {
        let (tx, rx) = mpsc::channel(self.watch_buffer);

        let watch_loop = WatchLoop {
            accessor: self.accessor.clone(),
            key: key.to_string(),
            token: self.token.clone(),
            wait_time: self.wait_time,
            retry_delay: self.retry_delay,
            cursor: 0,
            published_index: self.last_index.clone(),
            tx,
            stop,
        };
        tokio::spawn(watch_loop.run());

        Box::pin(ReceiverStream::new(rx))
    }
}
