//! Common test utilities for client integration tests
//!
//! Runs a real controller on a loopback port for the client to talk to.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thermo_client::{sync_channel, Channel, ClientConfig, ClientSynchronizer, ReconnectConfig};
use thermo_controller::{
    services::run_heartbeat, Config, ConnectionManager, ControllerSynchronizer, HistoryStore,
};
use thermo_shared_config::{CommonConfig, Environment, DEFAULT_NAMESPACE};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound on any single wait in these tests
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestController {
    pub addr: SocketAddr,
    pub sync: ControllerSynchronizer,
    pub history: HistoryStore,
    cancel: CancellationToken,
}

impl TestController {
    /// Controller with a 250ms heartbeat and no control loop
    pub async fn spawn() -> Self {
        let config = Config {
            heartbeat_interval: Duration::from_millis(250),
            ..Config::default()
        };
        let sync = ControllerSynchronizer::new(&config, ConnectionManager::new());
        let history = HistoryStore::new();
        let cancel = CancellationToken::new();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = thermo_controller::router(sync.clone(), history.clone());
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
        });

        tokio::spawn(run_heartbeat(
            sync.clone(),
            config.heartbeat_interval,
            cancel.clone(),
        ));

        Self {
            addr,
            sync,
            history,
            cancel,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            common: CommonConfig {
                environment: Environment::Development,
                namespace: DEFAULT_NAMESPACE.to_string(),
            },
            url: Url::parse(&format!("ws://{}/ws", self.addr)).unwrap(),
            history_url: Url::parse(&format!("http://{}/", self.addr)).unwrap(),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(50),
                max_delay: Duration::from_millis(200),
                max_retries: None,
            },
            history_poll: Duration::from_secs(30),
        }
    }

    /// A started client channel and its synchronizer
    pub fn client(&self) -> (Channel<ClientSynchronizer>, ClientSynchronizer, CancellationToken) {
        let cancel = CancellationToken::new();
        let (mut channel, sync) = sync_channel(&self.client_config(), cancel.clone());
        channel.connect();
        (channel, sync, cancel)
    }
}

impl Drop for TestController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Drive the channel until `done` holds for the synchronizer
pub async fn drive_until<F>(
    channel: &mut Channel<ClientSynchronizer>,
    sync: &mut ClientSynchronizer,
    mut done: F,
) where
    F: FnMut(&ClientSynchronizer) -> bool,
{
    let outcome = tokio::time::timeout(SYNC_TIMEOUT, async {
        while !done(sync) {
            match channel.next(sync).await {
                Some(Ok(())) => {}
                Some(Err(e)) => panic!("channel handler failed: {}", e),
                None => panic!("channel stopped"),
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "condition not reached, state {}", sync.state());
}

/// Await a future with the test timeout
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(SYNC_TIMEOUT, future)
        .await
        .expect("timed out")
}
