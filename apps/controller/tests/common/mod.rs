//! Common test utilities for controller integration tests
//!
//! Runs a real controller on a loopback port and talks to it with a
//! tokio-tungstenite client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thermo_controller::{
    services::run_heartbeat, Config, ConnectionManager, ControllerSynchronizer, HistoryStore,
};
use thermo_protocol::Envelope;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for a frame before failing
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// A controller listening on 127.0.0.1 with its heartbeat running
pub struct TestController {
    pub addr: SocketAddr,
    pub sync: ControllerSynchronizer,
    pub history: HistoryStore,
    cancel: CancellationToken,
}

impl TestController {
    pub async fn spawn(config: Config) -> Self {
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

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn connect(&self) -> WsClient {
        let (ws, _) = tokio_tungstenite::connect_async(self.ws_url()).await.unwrap();
        ws
    }
}

impl Drop for TestController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Config with a long heartbeat so tests see only the frames they cause
pub fn quiet_config() -> Config {
    Config {
        heartbeat_interval: Duration::from_secs(60),
        legacy_temp_ticks: false,
        ..Config::default()
    }
}

/// Config with a fast heartbeat
pub fn fast_config() -> Config {
    Config {
        heartbeat_interval: Duration::from_millis(250),
        ..Config::default()
    }
}

/// Next text frame from the socket, decoded as an envelope
pub async fn next_frame(ws: &mut WsClient) -> Envelope {
    loop {
        let message = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return Envelope::decode(&text).unwrap();
        }
    }
}

/// Next frame with the given event name, skipping others
pub async fn next_event(ws: &mut WsClient, event: &str) -> Envelope {
    loop {
        let frame = next_frame(ws).await;
        if frame.event == event {
            return frame;
        }
    }
}

/// Assert nothing arrives within `wait`
pub async fn assert_silent(ws: &mut WsClient, wait: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(wait, ws.next()).await {
        panic!("expected no frame, got {}", text);
    }
}

pub async fn send_frame(ws: &mut WsClient, frame: &Envelope) {
    ws.send(Message::Text(frame.encode().unwrap())).await.unwrap();
}

pub async fn send_raw(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}
