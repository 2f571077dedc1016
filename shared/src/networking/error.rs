use thiserror::Error;

/// Failures on the framed TCP protocol and the discovery sockets.
#[derive(Error, Debug)]
pub enum NetworkingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { length: u32, limit: u32 },

    #[error("malformed frame: json length {json_length} > total length {message_length}")]
    MalformedFrame { message_length: u32, json_length: u32 },

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("expected {expected}, got {received}")]
    UnexpectedMessage {
        expected: &'static str,
        received: String,
    },

    #[error("peer reported an error: {0}")]
    Remote(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("discovery cancelled before a coordinator announced itself")]
    DiscoveryCancelled,
}
