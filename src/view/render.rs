use std::fmt;

use crate::protocol::InboundMessage;

/// One rendered entry of the message list.
///
/// Mirrors the markup of the web client:
/// a system notice is a single `system-msg` line, a user message is a
/// `msg-header` line (bold author + time) followed by a `msg-content` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageNode {
    System {
        content: String,
        timestamp: String,
    },
    User {
        username: String,
        timestamp: String,
        content: String,
    },
}

impl MessageNode {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::System { .. } => None,
            Self::User { username, .. } => Some(username.as_str()),
        }
    }

    /// Visible texts in document order.
    pub fn text_parts(&self) -> Vec<&str> {
        match self {
            Self::System { content, timestamp } => vec![content.as_str(), timestamp.as_str()],
            Self::User {
                username,
                timestamp,
                content,
            } => vec![username.as_str(), timestamp.as_str(), content.as_str()],
        }
    }

    /// Number of visual lines the node occupies.
    pub fn line_count(&self) -> usize {
        match self {
            Self::System { .. } => 1,
            Self::User { .. } => 2,
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            Self::System { content, timestamp } => format!(
                r#"<div class="message"><div class="system-msg">{}<span class="msg-time">{}</span></div></div>"#,
                escape_html(content),
                escape_html(timestamp),
            ),
            Self::User {
                username,
                timestamp,
                content,
            } => format!(
                r#"<div class="message"><div class="msg-header"><b>{}</b><span class="msg-time">{}</span></div><div class="msg-content">{}</div></div>"#,
                escape_html(username),
                escape_html(timestamp),
                escape_html(content),
            ),
        }
    }
}

impl From<&InboundMessage> for MessageNode {
    fn from(message: &InboundMessage) -> Self {
        match message {
            InboundMessage::SystemNotice { content, timestamp } => Self::System {
                content: content.clone(),
                timestamp: timestamp.clone(),
            },
            InboundMessage::UserMessage {
                username,
                content,
                timestamp,
            } => Self::User {
                username: username.clone(),
                timestamp: timestamp.clone(),
                content: content.clone(),
            },
        }
    }
}

impl fmt::Display for MessageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System { content, timestamp } => write!(f, "  {}  ({})", content, timestamp),
            Self::User {
                username,
                timestamp,
                content,
            } => write!(f, "{} [{}]\n  {}", username, timestamp, content),
        }
    }
}

/// Escape text for inclusion in HTML
fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> MessageNode {
        MessageNode::from(&InboundMessage::UserMessage {
            username: "alice".to_string(),
            content: "hello".to_string(),
            timestamp: "09:30".to_string(),
        })
    }

    #[test]
    fn test_user_node_order() {
        let node = user();
        assert_eq!(node.text_parts(), vec!["alice", "09:30", "hello"]);
        assert_eq!(node.username(), Some("alice"));

        let html = node.to_html();
        let name = html.find("<b>alice</b>").unwrap();
        let time = html.find("09:30").unwrap();
        let content = html.find("hello").unwrap();
        assert!(name < time && time < content);
    }

    #[test]
    fn test_system_node_has_no_author() {
        let node = MessageNode::from(&InboundMessage::SystemNotice {
            content: "⭐ bob joined the room".to_string(),
            timestamp: "09:31".to_string(),
        });
        assert_eq!(node.username(), None);
        assert_eq!(node.line_count(), 1);
        let html = node.to_html();
        assert!(html.contains("system-msg"));
        assert!(html.contains("⭐ bob joined the room"));
        assert!(html.contains("09:31"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_html_is_escaped() {
        let node = MessageNode::User {
            username: "<script>".to_string(),
            timestamp: "1".to_string(),
            content: "a & \"b\"".to_string(),
        };
        let html = node.to_html();
        assert!(html.contains("<b>&lt;script&gt;</b>"));
        assert!(html.contains("a &amp; &quot;b&quot;"));
    }

    #[test]
    fn test_display() {
        assert_eq!(user().to_string(), "alice [09:30]\n  hello");
    }
}
