//! Wire format
//!
//! Frames are JSON text messages. The client sends [`OutboundMessage`];
//! the server sends [`InboundFrame`], which the client decodes into the
//! tagged [`InboundMessage`].

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Author name the relay puts on join/leave notices.
pub const SYSTEM_USERNAME: &str = "System";

/// Client-to-server chat line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub username: String,
    pub content: String,
}

impl OutboundMessage {
    pub fn new(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            content: content.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server-to-client frame exactly as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

impl InboundFrame {
    /// A join/leave notice as the relay emits it.
    pub fn system(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            username: Some(SYSTEM_USERNAME.to_string()),
            content: content.into(),
            timestamp: timestamp.into(),
            system: Some(true),
        }
    }

    pub fn user(
        username: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            content: content.into(),
            timestamp: timestamp.into(),
            system: Some(false),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded server frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// Room event (join/leave); rendered without an author.
    SystemNotice { content: String, timestamp: String },
    UserMessage {
        username: String,
        content: String,
        timestamp: String,
    },
}

impl InboundMessage {
    /// Parse and validate a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        Self::try_from(frame)
    }

    pub fn content(&self) -> &str {
        match self {
            Self::SystemNotice { content, .. } | Self::UserMessage { content, .. } => content,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Self::SystemNotice { timestamp, .. } | Self::UserMessage { timestamp, .. } => {
                timestamp
            }
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::SystemNotice { .. })
    }
}

impl TryFrom<InboundFrame> for InboundMessage {
    type Error = ChatError;

    fn try_from(frame: InboundFrame) -> Result<Self> {
        if frame.system.unwrap_or(false) {
            return Ok(Self::SystemNotice {
                content: frame.content,
                timestamp: frame.timestamp,
            });
        }

        let username = frame.username.ok_or(ChatError::MissingUsername)?;
        Ok(Self::UserMessage {
            username,
            content: frame.content,
            timestamp: frame.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_json() {
        let json = OutboundMessage::new("alice", "hi there").to_json().unwrap();
        assert_eq!(json, r#"{"username":"alice","content":"hi there"}"#);
    }

    #[test]
    fn test_decode_system_notice() {
        let msg = InboundMessage::decode(
            r#"{"username":"System","content":"⭐ bob joined the room","timestamp":"10:04","system":true}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::SystemNotice {
                content: "⭐ bob joined the room".to_string(),
                timestamp: "10:04".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_user_message_without_system_field() {
        let msg =
            InboundMessage::decode(r#"{"username":"bob","content":"yo","timestamp":"10:05"}"#)
                .unwrap();
        assert!(!msg.is_system());
        assert_eq!(msg.content(), "yo");
        assert_eq!(msg.timestamp(), "10:05");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let msg = InboundMessage::decode(
            r#"{"username":"bob","content":"yo","timestamp":"10:05","system":false,"id":7}"#,
        )
        .unwrap();
        assert!(matches!(msg, InboundMessage::UserMessage { .. }));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = InboundMessage::decode("not json").unwrap_err();
        assert!(matches!(err, ChatError::MalformedFrame(_)));

        let err = InboundMessage::decode(r#"{"username":"bob","content":"yo"}"#).unwrap_err();
        assert!(matches!(err, ChatError::MalformedFrame(_)));
    }

    #[test]
    fn test_decode_user_message_requires_username() {
        let err = InboundMessage::decode(r#"{"content":"yo","timestamp":"10:05"}"#).unwrap_err();
        assert!(matches!(err, ChatError::MissingUsername));
    }

    #[test]
    fn test_system_frame_json_shape() {
        let value: serde_json::Value =
            serde_json::from_str(&InboundFrame::system("bye", "11:00").to_json().unwrap())
                .unwrap();
        assert_eq!(value["username"], "System");
        assert_eq!(value["system"], true);
    }
}
