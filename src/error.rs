//! Error taxonomy for the chat client and the room relay.

use tokio_tungstenite::tungstenite;

/// Errors surfaced by the view, the socket transport and the relay.
///
/// Submitting an empty username or message is not an error; the view treats
/// it as a no-op and never produces one of these.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The page location cannot be turned into a connection target.
    #[error("invalid page location: {0}")]
    InvalidLocation(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Send attempted while the socket is connecting, closing or closed.
    #[error("WebSocket is not open")]
    NotOpen,

    /// Inbound frame is not JSON of the expected shape.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    #[error("user message without a username")]
    MissingUsername,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidLocation(_) => "invalid_location",
            Self::InvalidUrl(_) => "invalid_url",
            Self::NotOpen => "not_open",
            Self::MalformedFrame(_) => "malformed_frame",
            Self::MissingUsername => "missing_username",
            Self::WebSocket(_) => "websocket",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error describes a bad inbound payload rather than a
    /// transport or setup failure.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::MalformedFrame(_) | Self::MissingUsername)
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(ChatError::from(err).is_payload_error());
        assert!(ChatError::MissingUsername.is_payload_error());
        assert!(!ChatError::NotOpen.is_payload_error());
    }

    #[test]
    fn test_not_open_message() {
        assert_eq!(ChatError::NotOpen.to_string(), "WebSocket is not open");
        assert_eq!(ChatError::NotOpen.error_kind(), "not_open");
    }
}
