/*
[INPUT]:  WebSocket URL, outbound text frames
[OUTPUT]: Transport lifecycle events (opened / text / closed) via channels
[POS]:    Transport layer - socket abstraction beneath the STOMP connection
[UPDATE]: When changing socket handling or adding transport implementations
*/

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};

/// Event reported by the socket side of a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    /// Close, error, or failed dial. Always the last event of a link.
    Closed { reason: Option<String> },
}

/// Instruction sent from the connection to the socket side of a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Send(String),
    Close,
}

/// Connection-side end of one socket session.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::UnboundedSender<TransportCommand>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Socket-side end of one socket session.
#[derive(Debug)]
pub struct TransportPeer {
    commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportLink {
    /// Create a connected link/peer pair
    pub fn pair() -> (TransportLink, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportLink {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportPeer {
                commands: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// Queue text for the socket. Returns false when the socket side is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(TransportCommand::Send(text)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.outbound.send(TransportCommand::Close);
    }

    /// Next event; a vanished socket side reads as `Closed`.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed { reason: None })
    }
}

impl TransportPeer {
    /// Report an event to the connection. Returns false when the link was dropped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Next instruction from the connection; `None` once the link is dropped.
    pub async fn next_command(&mut self) -> Option<TransportCommand> {
        self.commands.recv().await
    }

    pub fn try_next_command(&mut self) -> Option<TransportCommand> {
        self.commands.try_recv().ok()
    }

    pub fn is_link_dropped(&self) -> bool {
        self.events.is_closed()
    }
}

/// Opens socket sessions for the connection manager.
///
/// `open` must not block: dial failures are reported as `TransportEvent::Closed`.
pub trait Transport: Send + 'static {
    fn open(&self, url: &str) -> TransportLink;
}

/// WebSocket transport backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> TransportLink {
        let (link, peer) = TransportLink::pair();
        tokio::spawn(run_socket(url.to_string(), peer));
        link
    }
}

async fn run_socket(url: String, mut peer: TransportPeer) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(err) => {
            debug!(%url, error = %err, "ws dial failed");
            peer.emit(TransportEvent::Closed {
                reason: Some(err.to_string()),
            });
            return;
        }
    };

    info!(%url, "ws transport opened");
    if !peer.emit(TransportEvent::Opened) {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            outbound = peer.next_command() => {
                match outbound {
                    Some(TransportCommand::Send(text)) => {
                        if let Err(err) = write.send(WsMessage::Text(text.into())).await {
                            break Some(err.to_string());
                        }
                    }
                    Some(TransportCommand::Close) | None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break None;
                    }
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !peer.emit(TransportEvent::Text(text.to_string())) {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break None;
                        }
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => {
                                if !peer.emit(TransportEvent::Text(text)) {
                                    let _ = write.send(WsMessage::Close(None)).await;
                                    break None;
                                }
                            }
                            Err(err) => {
                                debug!(error = %err, "ws binary message is not utf-8; dropped");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break frame.map(|frame| frame.reason.to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        break Some(err.to_string());
                    }
                    None => {
                        break Some("stream ended".to_string());
                    }
                }
            }
        }
    };

    info!(%url, reason = ?reason, "ws transport closed");
    peer.emit(TransportEvent::Closed { reason });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_and_peer_exchange_messages() {
        let (mut link, mut peer) = TransportLink::pair();

        assert!(link.send_text("CONNECT".to_string()));
        assert_eq!(
            peer.next_command().await,
            Some(TransportCommand::Send("CONNECT".to_string()))
        );

        assert!(peer.emit(TransportEvent::Opened));
        assert_eq!(link.next_event().await, TransportEvent::Opened);
    }

    #[tokio::test]
    async fn dropped_peer_reads_as_closed() {
        let (mut link, peer) = TransportLink::pair();
        drop(peer);
        assert_eq!(link.next_event().await, TransportEvent::Closed { reason: None });
        assert!(!link.send_text("x".to_string()));
    }

    #[tokio::test]
    async fn dropped_link_is_visible_to_peer() {
        let (link, mut peer) = TransportLink::pair();
        link.close();
        drop(link);

        assert_eq!(peer.next_command().await, Some(TransportCommand::Close));
        assert_eq!(peer.next_command().await, None);
        assert!(peer.is_link_dropped());
        assert!(!peer.emit(TransportEvent::Opened));
    }

    #[tokio::test]
    async fn ws_transport_reports_failed_dial_as_closed() {
        let mut link = WsTransport::new().open("ws://127.0.0.1:1/unreachable");
        match link.next_event().await {
            TransportEvent::Closed { reason } => assert!(reason.is_some()),
            other => panic!("expected Closed, got {other:?}"),
        }
    }
}
