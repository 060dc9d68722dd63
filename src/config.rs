//! Client configuration.
//!
//! Builders follow the `with_*` style; every field has a default that
//! matches the behavior of the original browser client.

/// Name used in the connection target when the username field is empty.
pub const DEFAULT_USERNAME: &str = "Guest";

/// First path segment of the connection target (`/ws/<room>`).
pub const DEFAULT_SOCKET_PATH: &str = "ws";

/// Options for the WebSocket transport.
#[derive(Clone, Debug)]
pub struct SocketOptions {
    /// `Origin` header sent with the handshake.
    pub origin: Option<String>,
    /// Values for the `Sec-WebSocket-Protocol` header.
    pub protocols: Vec<String>,
    /// Worker threads of the runtime that drives the socket.
    pub worker_threads: usize,
}

impl SocketOptions {
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            origin: None,
            protocols: Vec::new(),
            worker_threads: 2,
        }
    }
}

/// Configuration for [`ChatClientView`](crate::view::ChatClientView).
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub default_username: String,
    pub socket_path: String,
    pub socket: SocketOptions,
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_username(mut self, username: impl Into<String>) -> Self {
        self.default_username = username.into();
        self
    }

    pub fn with_socket_path(mut self, socket_path: impl Into<String>) -> Self {
        self.socket_path = socket_path.into().trim_matches('/').to_string();
        self
    }

    pub fn with_socket_options(mut self, socket: SocketOptions) -> Self {
        self.socket = socket;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_username: DEFAULT_USERNAME.to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            socket: SocketOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.default_username, "Guest");
        assert_eq!(config.socket_path, "ws");
        assert!(config.socket.origin.is_none());
        assert!(config.socket.protocols.is_empty());
        assert_eq!(config.socket.worker_threads, 2);
    }

    #[test]
    fn test_builders() {
        let config = ChatConfig::new()
            .with_default_username("Anon")
            .with_socket_path("/chat-ws/")
            .with_socket_options(
                SocketOptions::default()
                    .with_origin("http://localhost:8000")
                    .with_protocol("chat")
                    .with_worker_threads(0),
            );
        assert_eq!(config.default_username, "Anon");
        assert_eq!(config.socket_path, "chat-ws");
        assert_eq!(config.socket.origin.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.socket.protocols, vec!["chat".to_string()]);
        assert_eq!(config.socket.worker_threads, 1);
    }
}
