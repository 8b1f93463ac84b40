/*
[INPUT]:  Monitor scenarios needing a scriptable risk stream
[OUTPUT]: In-memory transport and STOMP server helpers
[POS]:    Test infrastructure - shared across monitor tests
[UPDATE]: When adding new test patterns or fixtures
*/

#![allow(dead_code)]

use riskstream_adapter::{Frame, StompCommand, Transport, TransportCommand, TransportEvent, TransportLink, TransportPeer};
use riskstream_monitor::MonitorConfig;
use tokio::sync::mpsc;

pub const TEST_URL: &str = "ws://localhost:8080/ws";

pub struct MockTransport {
    opened: mpsc::UnboundedSender<TransportPeer>,
}

impl Transport for MockTransport {
    fn open(&self, _url: &str) -> TransportLink {
        let (link, peer) = TransportLink::pair();
        let _ = self.opened.send(peer);
        link
    }
}

pub fn mock_transport() -> (MockTransport, mpsc::UnboundedReceiver<TransportPeer>) {
    let (opened, opened_rx) = mpsc::unbounded_channel();
    (MockTransport { opened }, opened_rx)
}

pub fn test_config(symbols: &[&str]) -> MonitorConfig {
    let yaml = format!(
        "url: {TEST_URL}\nsymbols: [{}]\n",
        symbols.join(", ")
    );
    MonitorConfig::from_yaml(&yaml).expect("test config")
}

pub async fn expect_frame(peer: &mut TransportPeer) -> Frame {
    match peer.next_command().await {
        Some(TransportCommand::Send(text)) => Frame::decode(&text).expect("client sent a valid frame"),
        other => panic!("expected a frame, got {other:?}"),
    }
}

/// Answer CONNECT and collect `(destination, id)` for each replayed SUBSCRIBE
pub async fn accept_session(peer: &mut TransportPeer, subscriptions: usize) -> Vec<(String, String)> {
    assert!(peer.emit(TransportEvent::Opened));
    let connect = expect_frame(peer).await;
    assert_eq!(connect.command, StompCommand::Connect);
    send_frame(peer, Frame::new(StompCommand::Connected).with_header("version", "1.2"));

    let mut seen = Vec::with_capacity(subscriptions);
    for _ in 0..subscriptions {
        let frame = expect_frame(peer).await;
        assert_eq!(frame.command, StompCommand::Subscribe);
        seen.push((
            frame.header("destination").expect("destination").to_string(),
            frame.header("id").expect("id").to_string(),
        ));
    }
    seen
}

pub fn subscription_for<'a>(seen: &'a [(String, String)], destination: &str) -> &'a str {
    seen.iter()
        .find(|(dest, _)| dest == destination)
        .map(|(_, id)| id.as_str())
        .expect("destination subscribed")
}

pub fn send_frame(peer: &TransportPeer, frame: Frame) {
    assert!(peer.emit(TransportEvent::Text(frame.encode())));
}

pub fn send_message(peer: &TransportPeer, subscription: &str, destination: &str, body: &str) {
    send_frame(
        peer,
        Frame::new(StompCommand::Message)
            .with_header("subscription", subscription)
            .with_header("destination", destination)
            .with_body(body),
    );
}
