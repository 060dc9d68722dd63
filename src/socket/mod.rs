//! WebSocket transport
//!
//! A socket with browser semantics on top of tokio-tungstenite: it opens in
//! the `Connecting` state, I/O runs on a dedicated thread with its own tokio
//! runtime, and `open` / `message` / `error` / `close` events are pushed to
//! the owning thread over a channel. Sends are refused unless the socket is
//! open; nothing is queued or retried.

mod connection;
mod events;

pub use connection::{WebSocket, WebSocketConnector};
pub use events::{EventDispatcher, SocketEvent, SocketEvents};

use url::Url;

use crate::config::SocketOptions;
use crate::error::Result;

/// Socket ready states (matching browser API)
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// The sending half of a connection as the chat view sees it.
pub trait Transport {
    /// Queue a text frame. Fails with `NotOpen` unless the socket is open.
    fn send(&self, data: String) -> Result<()>;

    fn ready_state(&self) -> ReadyState;

    /// Start the closing handshake.
    fn close(&self, code: u16, reason: &str);
}

/// Opens transports. The view is generic over this so hosts and tests can
/// substitute their own connection.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self, url: &Url, options: &SocketOptions) -> (Self::Transport, SocketEvents);
}
