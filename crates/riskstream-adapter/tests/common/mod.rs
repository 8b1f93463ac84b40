/*
[INPUT]:  Test scenarios needing a scriptable socket
[OUTPUT]: In-memory transport, frame helpers, shared fixtures
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for riskstream-adapter tests

#![allow(dead_code)]

use riskstream_adapter::{Frame, StompCommand, Transport, TransportCommand, TransportEvent, TransportLink, TransportPeer};
use tokio::sync::mpsc;

pub const TEST_URL: &str = "ws://localhost:8080/ws";

/// Transport that hands every opened socket to the test as a `TransportPeer`
pub struct MockTransport {
    opened: mpsc::UnboundedSender<(String, TransportPeer)>,
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> TransportLink {
        let (link, peer) = TransportLink::pair();
        let _ = self.opened.send((url.to_string(), peer));
        link
    }
}

pub fn mock_transport() -> (MockTransport, mpsc::UnboundedReceiver<(String, TransportPeer)>) {
    let (opened, opened_rx) = mpsc::unbounded_channel();
    (MockTransport { opened }, opened_rx)
}

/// Next peer opened by the client
pub async fn next_peer(opened: &mut mpsc::UnboundedReceiver<(String, TransportPeer)>) -> TransportPeer {
    let (_url, peer) = opened.recv().await.expect("transport opened");
    peer
}

/// Next frame the client wrote to the socket
pub async fn expect_frame(peer: &mut TransportPeer) -> Frame {
    match peer.next_command().await {
        Some(TransportCommand::Send(text)) => Frame::decode(&text).expect("client sent a valid frame"),
        other => panic!("expected a frame, got {other:?}"),
    }
}

pub fn send_frame(peer: &TransportPeer, frame: Frame) {
    assert!(peer.emit(TransportEvent::Text(frame.encode())));
}

pub fn close(peer: &TransportPeer) {
    let _ = peer.emit(TransportEvent::Closed {
        reason: Some("test close".to_string()),
    });
}

/// Open the socket, check CONNECT, and answer CONNECTED
pub async fn complete_handshake(peer: &mut TransportPeer) {
    assert!(peer.emit(TransportEvent::Opened));
    let connect = expect_frame(peer).await;
    assert_eq!(connect.command, StompCommand::Connect);
    send_frame(peer, connected_frame());
}

pub fn connected_frame() -> Frame {
    Frame::new(StompCommand::Connected).with_header("version", "1.2")
}

pub fn message_frame(subscription: &str, destination: &str, body: &str) -> Frame {
    Frame::new(StompCommand::Message)
        .with_header("subscription", subscription)
        .with_header("destination", destination)
        .with_header("message-id", "1")
        .with_body(body)
}
