use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use confkv_core::{
    BackendError, KvPair, KvPairs, QueryMeta, QueryOptions, StoreAccessor, WriteOptions,
};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    /// key -> (value, modify index)
    entries: BTreeMap<String, (Vec<u8>, u64)>,
    index: u64,
    wait_indexes: Vec<Option<u64>>,
    tokens: Vec<Option<String>>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    changed: Notify,
    failing: AtomicBool,
}

/// In-memory store with blocking reads keyed on a per-key modify index.
#[derive(Clone, Default)]
pub(crate) struct MemoryAccessor {
    inner: Arc<Inner>,
}

impl MemoryAccessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().entries.keys().cloned().collect()
    }

    pub(crate) fn seen_wait_indexes(&self) -> Vec<Option<u64>> {
        self.inner.state.lock().unwrap().wait_indexes.clone()
    }

    pub(crate) fn seen_tokens(&self) -> Vec<Option<String>> {
        self.inner.state.lock().unwrap().tokens.clone()
    }

    fn check_failing(&self) -> Result<(), BackendError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Store("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreAccessor for MemoryAccessor {
    async fn get_entry(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> Result<(Option<KvPair>, QueryMeta), BackendError> {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.wait_indexes.push(opts.wait_index);
            state.tokens.push(opts.token.clone());
        }
        self.check_failing()?;

        let wait_index = opts.wait_index.unwrap_or(0);
        loop {
            let notified = self.inner.changed.notified();
            {
                let state = self.inner.state.lock().unwrap();
                match state.entries.get(key) {
                    Some((value, modify_index)) if *modify_index > wait_index || wait_index == 0 => {
                        let meta = QueryMeta {
                            last_index: *modify_index,
                        };
                        return Ok((Some(KvPair::new(key, value.clone())), meta));
                    }
                    None => {
                        let meta = QueryMeta {
                            last_index: state.index,
                        };
                        return Ok((None, meta));
                    }
                    Some(_) => {}
                }
            }
            notified.await;
        }
    }

    async fn list_entries(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> Result<KvPairs, BackendError> {
        self.inner
            .state
            .lock()
            .unwrap()
            .tokens
            .push(opts.token.clone());
        self.check_failing()?;

        let state = self.inner.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (value, _))| KvPair::new(key.as_str(), value.clone()))
            .collect())
    }

    async fn put_entry(&self, entry: &KvPair, opts: &WriteOptions) -> Result<(), BackendError> {
        self.inner
            .state
            .lock()
            .unwrap()
            .tokens
            .push(opts.token.clone());
        self.check_failing()?;

        {
            let mut state = self.inner.state.lock().unwrap();
            state.index += 1;
            let index = state.index;
            state
                .entries
                .insert(entry.key.clone(), (entry.value.clone(), index));
        }
        self.inner.changed.notify_waiters();
        Ok(())
    }
}
