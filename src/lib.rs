//! # room_chat
//!
//! A room chat client over a single WebSocket, and the relay it talks to.
//!
//! - [`view`]: [`ChatClientView`] binds a username field, a message field and
//!   a message container to one socket.
//! - [`socket`]: a tokio-tungstenite connection with browser socket
//!   semantics, driven from its own thread.
//! - [`relay`]: an in-memory server that scopes frames to rooms.

pub mod config;
pub mod error;
pub mod location;
pub mod protocol;
pub mod relay;
pub mod socket;
pub mod view;

pub use config::{ChatConfig, SocketOptions};
pub use error::{ChatError, Result};
pub use location::PageLocation;
pub use protocol::{InboundFrame, InboundMessage, OutboundMessage};
pub use relay::{Relay, RelayHandle};
pub use socket::{ReadyState, SocketEvent, Transport, WebSocket};
pub use view::{ChatClientView, ChatElements, MessageList, MessageNode, TextField};
