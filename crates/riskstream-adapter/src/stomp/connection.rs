/*
[INPUT]:  Caller commands (connect / subscribe / unsubscribe / disconnect), transport events, backoff timer
[OUTPUT]: STOMP handshake, subscription frames, routed MESSAGE payloads, connection state + events
[POS]:    Protocol layer - single-connection STOMP client with automatic reconnection
[UPDATE]: When changing handshake, reconnection, resubscription, or shutdown semantics
*/

use std::future::pending;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::{Sleep, sleep};
use tracing::{debug, info, warn};
use url::Url;

use super::backoff::ReconnectBackoff;
use super::frame::{Frame, StompCommand};
use super::subscription::{Dispatch, Subscription, SubscriptionRegistry, next_subscription_id};
use super::transport::{Transport, TransportEvent, TransportLink, WsTransport};
use crate::error::{Result, RiskStreamError};

const RAW_LOG_MAX_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Liveness notifications, at most one per transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A CONNECTED frame completed the handshake
    Connected,
    /// A connection that had completed its handshake was lost
    Disconnected,
}

/// STOMP client configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StompClientConfig {
    #[serde(default)]
    pub backoff: ReconnectBackoff,
    /// Re-send SUBSCRIBE for every live subscription after each CONNECTED frame
    #[serde(default = "default_resubscribe")]
    pub resubscribe_on_reconnect: bool,
}

impl Default for StompClientConfig {
    fn default() -> Self {
        Self {
            backoff: ReconnectBackoff::default(),
            resubscribe_on_reconnect: default_resubscribe(),
        }
    }
}

fn default_resubscribe() -> bool {
    true
}

#[derive(Debug)]
pub(crate) enum ClientCommand {
    Connect {
        url: String,
    },
    Subscribe {
        id: String,
        destination: String,
        sender: mpsc::UnboundedSender<super::subscription::StompMessage>,
    },
    Unsubscribe {
        id: String,
    },
    Disconnect,
    Shutdown,
}

/// STOMP-over-WebSocket client.
///
/// All protocol state lives on one worker task; this handle only sends commands to it,
/// so every method returns immediately and effects are observed through
/// [`ConnectionEvent`]s, the state watch, and [`Subscription`] channels.
pub struct StompClient<T: Transport = WsTransport> {
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    pending: Option<PendingWorker<T>>,
    state_rx: watch::Receiver<ConnectionState>,
    events_rx: Option<mpsc::UnboundedReceiver<ConnectionEvent>>,
    worker_handle: Option<tokio::task::JoinHandle<()>>,
}

struct PendingWorker<T> {
    transport: T,
    config: StompClientConfig,
    cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl StompClient<WsTransport> {
    /// Create a client that dials real WebSocket endpoints
    pub fn new(config: StompClientConfig) -> Self {
        Self::with_transport(config, WsTransport::new())
    }
}

impl<T: Transport> StompClient<T> {
    /// Create a client over a custom transport.
    ///
    /// The worker starts lazily on the first `connect`; subscriptions made before that are queued.
    pub fn with_transport(config: StompClientConfig, transport: T) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            cmd_tx,
            pending: Some(PendingWorker {
                transport,
                config,
                cmd_rx,
                state_tx,
                events_tx,
            }),
            state_rx,
            events_rx: Some(events_rx),
            worker_handle: None,
        }
    }

    /// Take the connection event receiver (only once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        self.events_rx.take()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the connection and keep it alive with backoff until `disconnect`.
    pub fn connect(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RiskStreamError::UnsupportedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }

        self.start_worker_if_needed()?;
        self.send_command(ClientCommand::Connect {
            url: url.to_string(),
        })
    }

    /// Register interest in a destination. SUBSCRIBE goes out now if connected.
    pub fn subscribe(&self, destination: &str) -> Result<Subscription> {
        let id = next_subscription_id();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.send_command(ClientCommand::Subscribe {
            id: id.clone(),
            destination: destination.to_string(),
            sender,
        })?;

        Ok(Subscription::new(
            id,
            destination.to_string(),
            receiver,
            self.cmd_tx.clone(),
        ))
    }

    /// Close the connection, cancel reconnection, and end every subscription.
    pub fn disconnect(&self) -> Result<()> {
        self.send_command(ClientCommand::Disconnect)
    }

    /// Disconnect and stop the worker task
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Shutdown);
    }

    fn send_command(&self, command: ClientCommand) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| RiskStreamError::ClientClosed)
    }

    fn start_worker_if_needed(&mut self) -> Result<()> {
        if self.worker_handle.is_some() {
            return Ok(());
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RiskStreamError::Runtime);
        }

        let Some(pending) = self.pending.take() else {
            return Err(RiskStreamError::ClientClosed);
        };

        let worker = ConnectionWorker::new(pending);
        self.worker_handle = Some(tokio::spawn(worker.run()));
        Ok(())
    }
}

impl<T: Transport> Drop for StompClient<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Transport> std::fmt::Debug for StompClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StompClient")
            .field("state", &self.state())
            .field("worker_started", &self.worker_handle.is_some())
            .finish()
    }
}

struct ConnectionWorker<T> {
    transport: T,
    config: StompClientConfig,
    cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    state: ConnectionState,
    url: Option<String>,
    link: Option<TransportLink>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    reconnect_attempts: u32,
    registry: SubscriptionRegistry,
}

impl<T: Transport> ConnectionWorker<T> {
    fn new(pending: PendingWorker<T>) -> Self {
        Self {
            transport: pending.transport,
            config: pending.config,
            cmd_rx: pending.cmd_rx,
            state_tx: pending.state_tx,
            events_tx: pending.events_tx,
            state: ConnectionState::Disconnected,
            url: None,
            link: None,
            reconnect_timer: None,
            reconnect_attempts: 0,
            registry: SubscriptionRegistry::default(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Shutdown) | None => {
                            self.disconnect();
                            debug!("stomp worker stopped");
                            return;
                        }
                        Some(command) => self.handle_command(command),
                    }
                }
                event = next_link_event(&mut self.link) => {
                    self.handle_transport_event(event);
                }
                _ = reconnect_due(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.reconnect();
                }
            }
        }
    }

    fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Connect { url } => {
                self.reconnect_timer = None;
                self.url = Some(url.clone());
                self.open(&url);
            }
            ClientCommand::Subscribe {
                id,
                destination,
                sender,
            } => {
                if self.state == ConnectionState::Connected {
                    self.send_frame(&Frame::subscribe(&id, &destination));
                    info!(%id, %destination, "stomp subscribed");
                } else {
                    debug!(%id, %destination, "stomp subscription recorded while not connected");
                }
                self.registry.insert(id, destination, sender);
            }
            ClientCommand::Unsubscribe { id } => {
                if let Some(destination) = self.registry.remove(&id) {
                    if self.state == ConnectionState::Connected {
                        self.send_frame(&Frame::unsubscribe(&id));
                    }
                    info!(%id, %destination, "stomp unsubscribed");
                }
            }
            ClientCommand::Disconnect => self.disconnect(),
            ClientCommand::Shutdown => {}
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                debug!("transport opened; sending CONNECT");
                self.send_frame(&Frame::connect());
            }
            TransportEvent::Text(data) => self.handle_text(&data),
            TransportEvent::Closed { reason } => self.handle_closed(reason),
        }
    }

    fn handle_text(&mut self, data: &str) {
        if data.trim().is_empty() {
            return;
        }

        let Some(frame) = Frame::decode(data) else {
            debug!(bytes = data.len(), "stomp frame without header separator dropped");
            return;
        };

        let command = frame.command.clone();
        match command {
            StompCommand::Connected => self.handle_connected(&frame),
            StompCommand::Message => self.handle_message(frame),
            StompCommand::Error => {
                warn!(
                    error_message = frame.header("message").unwrap_or_default(),
                    body = %truncate_for_log(&frame.body, RAW_LOG_MAX_BYTES),
                    "stomp server error"
                );
            }
            other => {
                debug!(command = %other, "stomp frame ignored");
            }
        }
    }

    fn handle_connected(&mut self, frame: &Frame) {
        self.set_state(ConnectionState::Connected);
        self.reconnect_attempts = 0;
        info!(
            url = self.url.as_deref().unwrap_or_default(),
            version = frame.header("version").unwrap_or_default(),
            "stomp connected"
        );
        let _ = self.events_tx.send(ConnectionEvent::Connected);

        if self.config.resubscribe_on_reconnect {
            for (id, destination) in self.registry.destinations() {
                self.send_frame(&Frame::subscribe(&id, &destination));
                info!(%id, %destination, "stomp resubscribed");
            }
        }
    }

    fn handle_message(&mut self, frame: Frame) {
        let Some(subscription) = frame.header("subscription").map(str::to_string) else {
            debug!("stomp MESSAGE without subscription header dropped");
            return;
        };

        let payload = if frame.body.is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_str(&frame.body) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        %subscription,
                        error = %err,
                        body = %truncate_for_log(&frame.body, RAW_LOG_MAX_BYTES),
                        "stomp message parse failed; dropped"
                    );
                    return;
                }
            }
        };

        if self.registry.dispatch(&subscription, frame.headers, payload) == Dispatch::ReceiverGone {
            // The queued Unsubscribe command will find no entry, so the frame goes out here.
            if self.state == ConnectionState::Connected {
                self.send_frame(&Frame::unsubscribe(&subscription));
            }
            info!(%subscription, "stomp unsubscribed; handle already gone");
        }
    }

    fn handle_closed(&mut self, reason: Option<String>) {
        let was_connected = self.state == ConnectionState::Connected;
        self.link = None;
        self.set_state(ConnectionState::Disconnected);

        if was_connected {
            warn!(reason = reason.as_deref().unwrap_or_default(), "stomp connection lost");
            let _ = self.events_tx.send(ConnectionEvent::Disconnected);
        } else {
            debug!(reason = reason.as_deref().unwrap_or_default(), "stomp connection attempt closed");
        }

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() || self.url.is_none() {
            return;
        }

        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        let delay = self.config.backoff.delay(self.reconnect_attempts);
        info!(
            attempt = self.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "stomp reconnect scheduled"
        );
        self.reconnect_timer = Some(Box::pin(sleep(delay)));
    }

    fn reconnect(&mut self) {
        let Some(url) = self.url.clone() else {
            return;
        };
        self.open(&url);
    }

    fn open(&mut self, url: &str) {
        if let Some(previous) = self.link.take() {
            previous.close();
        }
        if self.state == ConnectionState::Connected {
            let _ = self.events_tx.send(ConnectionEvent::Disconnected);
        }

        info!(%url, "stomp connecting");
        self.link = Some(self.transport.open(url));
        self.set_state(ConnectionState::Connecting);
    }

    fn disconnect(&mut self) {
        self.reconnect_timer = None;
        self.reconnect_attempts = 0;
        self.url = None;

        if let Some(link) = self.link.take() {
            if self.state == ConnectionState::Connected {
                link.send_text(Frame::disconnect().encode());
            }
            link.close();
        }

        let dropped = self.registry.len();
        self.registry.clear();
        if self.state != ConnectionState::Disconnected || dropped > 0 {
            info!(dropped_subscriptions = dropped, "stomp disconnected");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn send_frame(&self, frame: &Frame) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if !link.send_text(frame.encode()) {
            debug!(command = %frame.command, "transport gone; frame not sent");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> TransportEvent {
    match link {
        Some(link) => link.next_event().await,
        None => pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut cut = max_len;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + 3);
    out.push_str(&value[..cut]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_non_websocket_urls() {
        let mut client = StompClient::new(StompClientConfig::default());
        assert!(matches!(
            client.connect("http://localhost:8080/ws"),
            Err(RiskStreamError::UnsupportedScheme { scheme }) if scheme == "http"
        ));
        assert!(matches!(
            client.connect("not a url"),
            Err(RiskStreamError::UrlParse(_))
        ));
    }

    #[test]
    fn connect_without_runtime_fails() {
        let mut client = StompClient::new(StompClientConfig::default());
        assert!(matches!(
            client.connect("ws://localhost:8080/ws"),
            Err(RiskStreamError::Runtime)
        ));
    }

    #[test]
    fn new_client_starts_disconnected() {
        let mut client = StompClient::new(StompClientConfig::default());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert!(client.take_events().is_some());
        assert!(client.take_events().is_none());
    }

    #[test]
    fn subscribe_before_connect_returns_handle() {
        let client = StompClient::new(StompClientConfig::default());
        let first = client.subscribe("/topic/risk/BTCUSDT").unwrap();
        let second = client.subscribe("/topic/risk/BTCUSDT").unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.destination(), "/topic/risk/BTCUSDT");
    }

    #[test]
    fn config_defaults_enable_resubscribe() {
        let config: StompClientConfig = serde_json::from_str("{}").unwrap();
        assert!(config.resubscribe_on_reconnect);
        assert_eq!(config.backoff, ReconnectBackoff::default());
    }

    #[test]
    fn truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }
}
