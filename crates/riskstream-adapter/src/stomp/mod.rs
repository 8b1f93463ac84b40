/*
[INPUT]:  WebSocket URL, destinations to follow
[OUTPUT]: STOMP connection lifecycle and per-destination JSON message streams
[POS]:    Protocol layer - STOMP 1.2 subset over WebSocket
[UPDATE]: When adding protocol features or changing reconnection behaviour
*/

pub mod backoff;
pub mod connection;
pub mod frame;
pub mod subscription;
pub mod transport;

pub use backoff::ReconnectBackoff;
pub use connection::{ConnectionEvent, ConnectionState, StompClient, StompClientConfig};
pub use frame::{Frame, StompCommand};
pub use subscription::{StompMessage, Subscription};
pub use transport::{Transport, TransportCommand, TransportEvent, TransportLink, TransportPeer, WsTransport};
