//! Unified error types for the depth mirror.

use thiserror::Error;

/// Unified error type for the depth mirror.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bad symbol or depth supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The snapshot could not be fetched or was malformed.
    #[error("feed unavailable for {symbol}: {source}")]
    FeedUnavailable {
        /// Symbol the snapshot was requested for.
        symbol: String,
        /// Underlying feed failure.
        #[source]
        source: FeedError,
    },

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Snapshot (REST) side of the market data feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed before a response was received.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The exchange answered with a non-success status.
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The payload parsed but violates the book's data model.
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// Failed to decode the response body.
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    /// The feed refused the request for another reason.
    #[error("snapshot request rejected: {0}")]
    Rejected(String),
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Message parsing failed.
    #[error("failed to parse websocket message: {0}")]
    ParseError(String),

    /// Stream URL could not be built.
    #[error("invalid stream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, MirrorError>;
