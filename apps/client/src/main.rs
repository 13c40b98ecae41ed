use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thermo_client::{sync_channel, ClientConfig, HistoryClient, Intent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thermo_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    if thermo_shared_config::load_dotenv() {
        tracing::debug!("Loaded .env file");
    }

    let config = ClientConfig::from_env()?;

    tracing::info!(
        url = %config.url,
        namespace = %config.namespace(),
        environment = %config.environment(),
        "Starting thermostat viewer"
    );

    let cancel = CancellationToken::new();
    let (mut channel, mut sync) = sync_channel(&config, cancel.clone());
    let mut history = HistoryClient::new(config.history_url.clone())?;
    channel.connect();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut history_tick = tokio::time::interval(config.history_poll);
    let mut shown = sync.render();
    tracing::info!(status = %shown.status, state = %sync.state(), "Display");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            event = channel.next(&mut sync) => {
                match event {
                    Some(Ok(())) => {}
                    Some(Err(e)) => tracing::error!(error = %e, "Sync channel error"),
                    None => {
                        tracing::warn!("Sync channel stopped");
                        break;
                    }
                }

                sync.refresh_view(&mut shown);
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<Intent>() {
                        Ok(intent) => {
                            sync.dispatch_intent(intent, &channel);
                        }
                        Err(e) => tracing::warn!(error = %e, "Ignoring input"),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        stdin_open = false;
                    }
                }
            }
            _ = history_tick.tick() => {
                match history.poll().await {
                    Ok(records) if !records.is_empty() => {
                        tracing::info!(count = records.len(), "Chart history backfilled");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, "History poll failed"),
                }
            }
        }
    }

    channel.shutdown();
    tracing::info!("Viewer stopped");

    Ok(())
}
