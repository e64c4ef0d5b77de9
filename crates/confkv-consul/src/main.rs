use clap::Parser;
use confkv_consul::{Command, Config, WatchingKvClient};
use confkv_core::ConfigBackend;
use futures::StreamExt;
use tokio::signal;
use tokio::sync::watch as tokio_watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries values only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let client = WatchingKvClient::connect(config.client_config())?;

    match config.command {
        Command::Get { key } => {
            let value = client.get(&key).await?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Command::List { prefix } => {
            for pair in client.list(&prefix).await? {
                println!("{} = {}", pair.key, String::from_utf8_lossy(&pair.value));
            }
        }
        Command::Set { key, value } => {
            client.set(&key, value.as_bytes()).await?;
            info!("Stored {}", key);
        }
        Command::Watch { key } => {
            let stop = create_shutdown_signal();
            let mut updates = client.watch(&key, stop);

            while let Some(response) = updates.next().await {
                match response.into_result() {
                    Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
                    Err(e) => eprintln!("{}: {}", key, e),
                }
            }
            info!("Watch on {} finished", key);
        }
    }

    Ok(())
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> tokio_watch::Receiver<bool> {
    let (tx, rx) = tokio_watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            info!("Received Ctrl+C, stopping watch");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
            info!("Received SIGTERM, stopping watch");
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}
