/*
[INPUT]:  Error sources (serialization, URL parsing, runtime, worker lifecycle)
[OUTPUT]: Structured error types for the adapter crate
[POS]:    Error handling layer - unified error type for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the risk stream adapter.
///
/// Socket failures never surface here: they end the transport session and drive reconnection.
#[derive(Error, Debug)]
pub enum RiskStreamError {
    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// URL parsed but is not a WebSocket endpoint
    #[error("Unsupported URL scheme '{scheme}', expected ws or wss")]
    UnsupportedScheme { scheme: String },

    /// An operation that needs the connection worker ran outside a Tokio runtime
    #[error("No Tokio runtime available to drive the connection")]
    Runtime,

    /// The connection worker has already shut down
    #[error("STOMP client is closed")]
    ClientClosed,
}

/// Result type alias for risk stream operations
pub type Result<T> = std::result::Result<T, RiskStreamError>;
