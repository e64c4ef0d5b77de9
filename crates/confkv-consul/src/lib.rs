//! Consul KV backend for confkv.
//!
//! [`WatchingKvClient`] implements [`ConfigBackend`](confkv_core::ConfigBackend) on top of any
//! [`StoreAccessor`](confkv_core::StoreAccessor); [`ConsulAccessor`] is the HTTP implementation
//! for Consul agents. Watches use Consul blocking queries and retry on a fixed delay.

mod accessor;
mod client;
mod config;
mod watch;

#[cfg(test)]
mod test_utils;

pub use accessor::{ConsulAccessor, DEFAULT_ADDRESS};
pub use client::WatchingKvClient;
pub use config::{ClientConfig, Command, Config, DEFAULT_RETRY_DELAY, DEFAULT_WATCH_BUFFER};
