/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public risk stream adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod error;
pub mod heatmap;
pub mod stomp;
pub mod types;

pub use error::{Result, RiskStreamError};

// Re-export commonly used types from heatmap
pub use heatmap::{
    generate as generate_heatmap,
    Bucket,
    HeatmapOptions,
    HeatmapResult,
    LeverageTier,
    LEVERAGE_TIERS,
};

// Re-export commonly used types from stomp
pub use stomp::{
    ConnectionEvent,
    ConnectionState,
    Frame,
    ReconnectBackoff,
    StompClient,
    StompClientConfig,
    StompCommand,
    StompMessage,
    Subscription,
    Transport,
    TransportCommand,
    TransportEvent,
    TransportLink,
    TransportPeer,
    WsTransport,
};

// Re-export all types
pub use types::*;
