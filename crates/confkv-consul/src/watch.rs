use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use confkv_core::{BackendError, QueryOptions, StoreAccessor, WatchResponse};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Long-poll loop behind a single watch stream.
///
/// Owns its change-index cursor: the cursor starts at 0 and only ever takes
/// the index reported by a successful read. Errors leave it untouched.
pub(crate) struct WatchLoop<A: StoreAccessor> {
    pub(crate) accessor: Arc<A>,
    pub(crate) key: String,
    pub(crate) token: Option<String>,
    pub(crate) wait_time: Option<Duration>,
    pub(crate) retry_delay: Duration,
    pub(crate) cursor: u64,
    /// Highest index seen by any watch on the owning client
    pub(crate) published_index: Arc<AtomicU64>,
    pub(crate) tx: mpsc::Sender<WatchResponse>,
    pub(crate) stop: watch::Receiver<bool>,
}

/// Resolves once `stop` turns `true` or its sender goes away.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|&v| v).await;
}

impl<A: StoreAccessor> WatchLoop<A> {
    pub(crate) async fn run(mut self) {
        info!("Watching {} (retry delay {:?})", self.key, self.retry_delay);

        loop {
            if *self.stop.borrow() {
                break;
            }

            let opts = QueryOptions {
                token: self.token.clone(),
                wait_index: Some(self.cursor),
                wait_time: self.wait_time,
            };

            let result = tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => break,
                result = self.accessor.get_entry(&self.key, &opts) => result,
            };

            let result = match result {
                Ok((Some(entry), meta)) => Ok((entry.value, meta.last_index)),
                Ok((None, _)) => Err(BackendError::NotFound(self.key.clone())),
                Err(e) => Err(e),
            };

            match result {
                Ok((value, index)) => {
                    debug!(
                        "Watch {} advanced {} -> {} ({} bytes)",
                        self.key,
                        self.cursor,
                        index,
                        value.len()
                    );
                    self.cursor = index;
                    self.published_index.fetch_max(index, Ordering::AcqRel);

                    if !self.emit(WatchResponse::value(value)).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        "Watch {} failed at index {}: {}; retrying in {:?}",
                        self.key, self.cursor, e, self.retry_delay
                    );

                    if !self.emit(WatchResponse::error(e)).await {
                        break;
                    }

                    tokio::select! {
                        biased;
                        _ = stopped(&mut self.stop) => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!("Stopped watching {} at index {}", self.key, self.cursor);
    }

    /// Send one response. Returns `false` when the watch should end.
    async fn emit(&mut self, response: WatchResponse) -> bool {
        tokio::select! {
            biased;
            _ = stopped(&mut self.stop) => false,
            sent = self.tx.send(response) => {
                if sent.is_err() {
                    debug!("Watch consumer for {} went away", self.key);
                }
                sent.is_ok()
            }
        }
    }
}
