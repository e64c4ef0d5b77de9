use std::time::Duration;

use clap::{Parser, Subcommand};

/// Default delay between watch retries after an error.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default capacity of the channel backing a watch stream.
pub const DEFAULT_WATCH_BUFFER: usize = 10;

/// Options for building a [`WatchingKvClient`](crate::WatchingKvClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Agent addresses. Only the first one is used.
    pub endpoints: Vec<String>,
    /// Access token sent with every request
    pub token: Option<String>,
    /// Delay before a watch retries after an error
    pub retry_delay: Duration,
    /// Capacity of each watch stream's buffer
    pub watch_buffer: usize,
    /// Maximum time the store may hold a watch long-poll (server default when unset)
    pub wait_time: Option<Duration>,
}

impl ClientConfig {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_watch_buffer(mut self, watch_buffer: usize) -> Self {
        self.watch_buffer = watch_buffer;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = Some(wait_time);
        self
    }

    /// The endpoint the client will talk to, if any was configured.
    pub fn primary_endpoint(&self) -> Option<&str> {
        self.endpoints.first().map(String::as_str)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            token: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            watch_buffer: DEFAULT_WATCH_BUFFER,
            wait_time: None,
        }
    }
}

/// Command-line configuration for the confkv-consul tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "confkv-consul")]
#[command(about = "Read, write and watch configuration stored in Consul KV")]
pub struct Config {
    /// Consul agent address (repeatable; only the first is used)
    #[arg(long = "endpoint", env = "CONSUL_HTTP_ADDR", value_delimiter = ',')]
    pub endpoints: Vec<String>,

    /// ACL token
    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Delay before a watch retries after an error (seconds)
    #[arg(long, default_value = "5", env = "CONFKV_RETRY_DELAY")]
    pub retry_delay_secs: u64,

    /// Maximum blocking time of a watch long-poll (seconds, server default when unset)
    #[arg(long, env = "CONFKV_WAIT_TIME")]
    pub wait_time_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value stored at a key
    Get { key: String },
    /// Print every key and value under a prefix
    List { prefix: String },
    /// Store a value at a key
    Set { key: String, value: String },
    /// Print every new value of a key until interrupted
    Watch { key: String },
}

impl Config {
    /// Library-level client options derived from the command line.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.endpoints.iter().cloned())
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs));
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            config = config.with_token(token);
        }
        if let Some(secs) = self.wait_time_secs {
            config = config.with_wait_time(Duration::from_secs(secs));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.token, None);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.watch_buffer, 10);
        assert_eq!(config.primary_endpoint(), None);
    }

    #[test]
    fn test_primary_endpoint_is_first() {
        let config = ClientConfig::new(["10.0.0.1:8500", "10.0.0.2:8500"]).with_token("t");
        assert_eq!(config.primary_endpoint(), Some("10.0.0.1:8500"));
        assert_eq!(config.token.as_deref(), Some("t"));
    }

    #[test]
    fn test_cli_parses_watch_command() {
        let cli = Config::try_parse_from([
            "confkv-consul",
            "--endpoint",
            "10.0.0.1:8500",
            "--token",
            "secret",
            "--retry-delay-secs",
            "2",
            "watch",
            "app/port",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Watch {
                key: "app/port".to_string()
            }
        );
        let config = cli.client_config();
        assert_eq!(config.primary_endpoint(), Some("10.0.0.1:8500"));
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_cli_empty_token_is_no_token() {
        let cli = Config::try_parse_from(["confkv-consul", "--token", "", "get", "k"]).unwrap();
        assert_eq!(cli.client_config().token, None);
    }
}
