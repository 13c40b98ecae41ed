//! Reconnecting sync channel
//!
//! A background task owns the WebSocket and reconnects with exponential
//! backoff plus jitter whenever it drops. Everything it observes (connection
//! attempts, open, frames, close, backoff) is queued as a [`ChannelEvent`]
//! for the owning task, which runs the registered handlers one at a time in
//! arrival order. Handlers therefore never race each other and the state they
//! mutate needs no lock.
//!
//! Outbound frames go through a queue that exists only while a connection is
//! open. Sending while disconnected drops the frame and reports it as not
//! sent; nothing is buffered for a later connection.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thermo_protocol::{Command, Envelope};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ClientError, ClientResult};

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Channel events ───────────────────────────────────────────────────

/// Something the connection task observed
#[derive(Debug)]
pub enum ChannelEvent {
    /// A connection attempt is starting
    Connecting { attempt: u32 },
    /// Connection established; frames sent on `outbound` go to this socket
    Open {
        outbound: mpsc::UnboundedSender<Envelope>,
    },
    Frame(Envelope),
    Closed { reason: String },
    /// Waiting `delay` before attempt number `attempt`
    Reconnecting { attempt: u32, delay: Duration },
    /// Retry limit reached; runs the close handlers and no further events follow
    GaveUp { attempts: u32 },
}

/// Where commands go
///
/// Implemented by [`Channel`]; tests substitute a recorder.
pub trait CommandSink {
    /// Send one command. Returns false when it was dropped.
    fn send_command(&self, command: &Command) -> bool;
}

type FrameHandler<S> = Box<dyn FnMut(&mut S, &Envelope) -> ClientResult<()> + Send>;
type OpenHandler<S> = Box<dyn FnMut(&mut S) + Send>;
type CloseHandler<S> = Box<dyn FnMut(&mut S, &str) + Send>;
type AttemptHandler<S> = Box<dyn FnMut(&mut S, u32) + Send>;
type ReconnectHandler<S> = Box<dyn FnMut(&mut S, u32, Duration) + Send>;

/// Client end of the sync channel
///
/// Generic over the state `S` its handlers mutate.
pub struct Channel<S> {
    url: Url,
    namespace: String,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,

    outbound: Option<mpsc::UnboundedSender<Envelope>>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,

    frame_handlers: HashMap<String, FrameHandler<S>>,
    open_handlers: Vec<OpenHandler<S>>,
    close_handlers: Vec<CloseHandler<S>>,
    connecting_handlers: Vec<AttemptHandler<S>>,
    reconnect_handlers: Vec<ReconnectHandler<S>>,
}

impl<S> Channel<S> {
    pub fn new(
        url: Url,
        namespace: impl Into<String>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url,
            namespace: namespace.into(),
            reconnect,
            cancel,
            outbound: None,
            events: None,
            frame_handlers: HashMap::new(),
            open_handlers: Vec::new(),
            close_handlers: Vec::new(),
            connecting_handlers: Vec::new(),
            reconnect_handlers: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // ── Handler registration ──

    /// Register the handler for one event name, replacing any previous one
    pub fn on_event<F>(&mut self, event: &str, handler: F)
    where
        F: FnMut(&mut S, &Envelope) -> ClientResult<()> + Send + 'static,
    {
        self.frame_handlers
            .insert(event.to_string(), Box::new(handler));
    }

    pub fn on_open<F>(&mut self, handler: F)
    where
        F: FnMut(&mut S) + Send + 'static,
    {
        self.open_handlers.push(Box::new(handler));
    }

    pub fn on_close<F>(&mut self, handler: F)
    where
        F: FnMut(&mut S, &str) + Send + 'static,
    {
        self.close_handlers.push(Box::new(handler));
    }

    /// Called as each connection attempt starts
    pub fn on_connecting<F>(&mut self, handler: F)
    where
        F: FnMut(&mut S, u32) + Send + 'static,
    {
        self.connecting_handlers.push(Box::new(handler));
    }

    /// Called when a reconnect is scheduled, with the attempt number and delay
    pub fn on_reconnect<F>(&mut self, handler: F)
    where
        F: FnMut(&mut S, u32, Duration) + Send + 'static,
    {
        self.reconnect_handlers.push(Box::new(handler));
    }

    // ── Lifecycle ──

    /// Spawn the connection task. Calling it again while running is a no-op.
    pub fn connect(&mut self) {
        if self.events.is_some() {
            tracing::debug!("Channel already started");
            return;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.events = Some(event_rx);

        let url = self.url.clone();
        let reconnect = self.reconnect.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            connection_loop(url, reconnect, event_tx, cancel).await;
        });
    }

    /// Stop the connection task
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_connected(&self) -> bool {
        self.outbound
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Send one event. Returns false, dropping the frame, while disconnected.
    pub fn send(&self, event: &str, payload: Value) -> bool {
        let frame = Envelope::new(self.namespace.as_str(), event, payload);
        match &self.outbound {
            Some(tx) if !tx.is_closed() => tx.send(frame).is_ok(),
            _ => {
                tracing::debug!(event, "Not connected, dropping outbound frame");
                false
            }
        }
    }

    /// Wait for the next channel event and run its handlers
    ///
    /// Returns `None` once the channel has stopped for good (shutdown or retry
    /// limit). Handler errors are returned, not swallowed.
    pub async fn next(&mut self, state: &mut S) -> Option<ClientResult<()>> {
        let event = self.events.as_mut()?.recv().await?;
        Some(self.dispatch(state, event))
    }

    /// Drive the channel until it stops, logging handler errors
    pub async fn run(&mut self, state: &mut S) {
        while let Some(result) = self.next(state).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Channel handler failed");
            }
        }
    }

    fn dispatch(&mut self, state: &mut S, event: ChannelEvent) -> ClientResult<()> {
        match event {
            ChannelEvent::Connecting { attempt } => {
                for handler in &mut self.connecting_handlers {
                    handler(state, attempt);
                }
                Ok(())
            }
            ChannelEvent::Open { outbound } => {
                self.outbound = Some(outbound);
                for handler in &mut self.open_handlers {
                    handler(state);
                }
                Ok(())
            }
            ChannelEvent::Frame(frame) => self.dispatch_frame(state, frame),
            ChannelEvent::Closed { reason } => {
                self.outbound = None;
                for handler in &mut self.close_handlers {
                    handler(state, &reason);
                }
                Ok(())
            }
            ChannelEvent::Reconnecting { attempt, delay } => {
                for handler in &mut self.reconnect_handlers {
                    handler(state, attempt, delay);
                }
                Ok(())
            }
            ChannelEvent::GaveUp { attempts } => {
                self.outbound = None;
                let reason = format!("gave up after {} attempts", attempts);
                for handler in &mut self.close_handlers {
                    handler(state, &reason);
                }
                Err(ClientError::RetriesExhausted(attempts))
            }
        }
    }

    fn dispatch_frame(&mut self, state: &mut S, frame: Envelope) -> ClientResult<()> {
        if frame.expect_namespace(&self.namespace).is_err() {
            tracing::debug!(ns = %frame.ns, event = %frame.event, "Ignoring frame for another namespace");
            return Ok(());
        }

        match self.frame_handlers.get_mut(&frame.event) {
            Some(handler) => handler(state, &frame),
            None => {
                tracing::debug!(event = %frame.event, "No handler for event");
                Ok(())
            }
        }
    }
}

impl<S> CommandSink for Channel<S> {
    fn send_command(&self, command: &Command) -> bool {
        self.send(command.event_name(), command.payload())
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump → on drop, backoff → reconnect.
///
/// The attempt counter resets whenever a connection was established, so a
/// long-lived connection that drops starts again from the initial delay.
async fn connection_loop(
    url: Url,
    reconnect: ReconnectConfig,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if event_tx.send(ChannelEvent::Connecting { attempt }).is_err() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_pump(&url, &event_tx, &cancel) => {
                match result {
                    Ok(reason) => {
                        tracing::info!(reason = %reason, "Sync channel closed");
                        attempt = 0;
                        if event_tx.send(ChannelEvent::Closed { reason }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "Sync channel connect failed");
                        attempt += 1;

                        if let Some(max) = reconnect.max_retries {
                            if attempt > max {
                                tracing::error!(
                                    max_retries = max,
                                    "Reconnection limit reached, giving up"
                                );
                                let _ = event_tx.send(ChannelEvent::GaveUp { attempts: max });
                                break;
                            }
                        }
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            attempt,
            "Waiting before reconnect"
        );
        if event_tx
            .send(ChannelEvent::Reconnecting { attempt, delay })
            .is_err()
        {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("Sync channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and pump frames both ways until it drops.
///
/// `Err` means no connection was made. Once the socket is open every ending
/// is `Ok` with a human-readable reason.
async fn connect_and_pump(
    url: &Url,
    event_tx: &mpsc::UnboundedSender<ChannelEvent>,
    cancel: &CancellationToken,
) -> ClientResult<String> {
    tracing::info!(url = %url, "Connecting to controller");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();
    if event_tx.send(ChannelEvent::Open { outbound: out_tx }).is_err() {
        return Ok("channel owner dropped".to_string());
    }
    tracing::info!("Sync channel open");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.close().await;
                return Ok("shutdown".to_string());
            }
            outbound = out_rx.recv() => {
                let Some(frame) = outbound else {
                    let _ = write.close().await;
                    return Ok("channel owner dropped".to_string());
                };
                match frame.encode() {
                    Ok(text) => {
                        if let Err(e) = write.send(tungstenite::Message::Text(text)).await {
                            return Ok(format!("send failed: {}", e));
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to encode outbound frame"),
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(tungstenite::Message::Text(text))) => match Envelope::decode(&text) {
                        Ok(frame) => {
                            if event_tx.send(ChannelEvent::Frame(frame)).is_err() {
                                return Ok("channel owner dropped".to_string());
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Discarding malformed frame"),
                    },
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return Ok(match frame {
                            Some(cf) => format!("closed by controller ({}: {})", cf.code, cf.reason),
                            None => "closed by controller".to_string(),
                        });
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                    Some(Err(e)) => return Ok(format!("read failed: {}", e)),
                    None => return Ok("stream ended".to_string()),
                }
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple viewers.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(31) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use thermo_protocol::Mode;

    #[derive(Default)]
    struct Log {
        entries: Vec<String>,
    }

    fn channel() -> Channel<Log> {
        let mut channel = Channel::new(
            Url::parse("ws://127.0.0.1:1/ws").unwrap(),
            "/thermostat",
            ReconnectConfig::default(),
            CancellationToken::new(),
        );
        channel.on_event("statusHeartbeat", |log: &mut Log, frame| {
            log.entries.push(format!("frame:{}", frame.event));
            Ok(())
        });
        channel.on_open(|log| log.entries.push("open".to_string()));
        channel.on_close(|log, reason| log.entries.push(format!("close:{}", reason)));
        channel.on_reconnect(|log, attempt, _| log.entries.push(format!("reconnect:{}", attempt)));
        channel
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        // With jitter factor up to 1.25, max effective is 12.5s
        for attempt in [10, 40, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            assert!(delay <= Duration::from_millis(12_500), "{delay:?}");
        }
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let channel = channel();
        assert!(!channel.is_connected());
        assert!(!channel.send("set_mode", json!(1)));
        assert!(!channel.send_command(&Command::SetMode(Mode::Heat)));
    }

    #[test]
    fn send_while_open_uses_namespace() {
        let mut channel = channel();
        let mut log = Log::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        channel.dispatch(&mut log, ChannelEvent::Open { outbound: tx }).unwrap();
        assert!(channel.send_command(&Command::SetEnabled(true)));

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.ns, "/thermostat");
        assert_eq!(frame.event, "enable_system");
        assert_eq!(log.entries, vec!["open"]);
    }

    #[test]
    fn close_drops_outbound_queue() {
        let mut channel = channel();
        let mut log = Log::default();
        let (tx, _rx) = mpsc::unbounded_channel();

        channel.dispatch(&mut log, ChannelEvent::Open { outbound: tx }).unwrap();
        channel
            .dispatch(&mut log, ChannelEvent::Closed { reason: "stream ended".to_string() })
            .unwrap();

        assert!(!channel.is_connected());
        assert!(!channel.send("enable_system", json!({})));
        assert_eq!(log.entries, vec!["open", "close:stream ended"]);
    }

    #[test]
    fn frames_route_by_event_and_namespace() {
        let mut channel = channel();
        let mut log = Log::default();

        let ours = Envelope::new("/thermostat", "statusHeartbeat", json!({}));
        let foreign = Envelope::new("/chat", "statusHeartbeat", json!({}));
        let unhandled = Envelope::new("/thermostat", "weather", json!({}));

        for frame in [ours, foreign, unhandled] {
            channel.dispatch(&mut log, ChannelEvent::Frame(frame)).unwrap();
        }

        assert_eq!(log.entries, vec!["frame:statusHeartbeat"]);
    }

    #[test]
    fn handler_errors_propagate() {
        let mut channel = channel();
        channel.on_event("connected", |_: &mut Log, _| {
            Err(ClientError::InvalidIntent("boom".to_string()))
        });
        let mut log = Log::default();

        let frame = Envelope::new("/thermostat", "connected", json!({}));
        assert!(channel.dispatch(&mut log, ChannelEvent::Frame(frame)).is_err());
    }

    #[test]
    fn reconnect_and_give_up_events() {
        let mut channel = channel();
        let mut log = Log::default();

        channel
            .dispatch(
                &mut log,
                ChannelEvent::Reconnecting {
                    attempt: 3,
                    delay: Duration::from_secs(8),
                },
            )
            .unwrap();
        assert_eq!(log.entries, vec!["reconnect:3"]);

        let result = channel.dispatch(&mut log, ChannelEvent::GaveUp { attempts: 5 });
        assert!(matches!(result, Err(ClientError::RetriesExhausted(5))));
        assert_eq!(
            log.entries,
            vec!["reconnect:3", "close:gave up after 5 attempts"]
        );
    }

    #[tokio::test]
    async fn gives_up_after_retry_limit() {
        // port 1 on loopback refuses connections
        let mut channel: Channel<Log> = Channel::new(
            Url::parse("ws://127.0.0.1:1/ws").unwrap(),
            "/thermostat",
            ReconnectConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                max_retries: Some(2),
            },
            CancellationToken::new(),
        );
        let mut log = Log::default();
        channel.connect();

        let mut gave_up = false;
        let outcome = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(result) = channel.next(&mut log).await {
                if matches!(result, Err(ClientError::RetriesExhausted(2))) {
                    gave_up = true;
                }
            }
        })
        .await;

        assert!(outcome.is_ok(), "channel did not stop");
        assert!(gave_up);
    }
}
