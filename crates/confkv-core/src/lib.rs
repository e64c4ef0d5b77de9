//! Core traits and types for confkv configuration store backends.
//!
//! This crate defines the abstractions shared between the adapter and the stores it talks to:
//! - `StoreAccessor`: Raw long-poll capable access to a remote key-value store
//! - `ConfigBackend`: Uniform get/list/set/watch interface consumed by templating tools
//! - `KvPair` / `WatchResponse`: Values crossing those seams

mod backend;
mod error;
mod kv;

pub use backend::{ConfigBackend, QueryMeta, QueryOptions, StoreAccessor, WatchStream, WriteOptions};
pub use error::BackendError;
pub use kv::{KvPair, KvPairs, WatchResponse};
