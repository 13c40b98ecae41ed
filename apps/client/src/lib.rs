//! Thermostat viewer client
//!
//! [`Channel`] keeps a WebSocket to the controller alive and feeds its events
//! to a [`ClientSynchronizer`], which mirrors the controller's snapshot and
//! renders it. [`HistoryClient`] backfills chart data over HTTP.

pub mod config;
pub mod error;
pub mod history;
pub mod sync;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use history::HistoryClient;
pub use sync::{ClientSynchronizer, Intent, SyncState, ViolationPolicy};
pub use transport::{calculate_backoff, Channel, ChannelEvent, CommandSink, ReconnectConfig};

use tokio_util::sync::CancellationToken;

/// Build a channel with a synchronizer's handlers installed
pub fn sync_channel(
    config: &ClientConfig,
    cancel: CancellationToken,
) -> (Channel<ClientSynchronizer>, ClientSynchronizer) {
    let mut channel = Channel::new(
        config.url.clone(),
        config.namespace(),
        config.reconnect.clone(),
        cancel,
    );
    ClientSynchronizer::install(&mut channel);
    let sync = ClientSynchronizer::new(ViolationPolicy::from(config.environment()));
    (channel, sync)
}
