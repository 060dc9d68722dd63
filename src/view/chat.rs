use std::time::Duration;

use url::Url;

use crate::config::ChatConfig;
use crate::error::Result;
use crate::location::PageLocation;
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::socket::{
    Connector, ReadyState, SocketEvent, SocketEvents, Transport, WebSocket, WebSocketConnector,
};
use crate::view::{ChatElements, MessageList, MessageNode, TextField};

/// Chat client bound to one room over one socket.
///
/// All methods run to completion on the thread that owns the view; socket
/// I/O happens elsewhere and only reaches the view through [`pump`].
///
/// [`pump`]: ChatClientView::pump
pub struct ChatClientView<T, F, L> {
    socket: T,
    events: SocketEvents,
    elements: ChatElements<F, L>,
    room_id: String,
    url: Url,
    /// Username carried by the connection target.
    connected_as: String,
}

impl<F: TextField, L: MessageList> ChatClientView<WebSocket, F, L> {
    /// Bind the elements and open a socket to the room of `location`.
    pub fn connect(
        elements: ChatElements<F, L>,
        location: &PageLocation,
        config: &ChatConfig,
    ) -> Result<Self> {
        Self::connect_with(&WebSocketConnector, elements, location, config)
    }
}

impl<T: Transport, F: TextField, L: MessageList> ChatClientView<T, F, L> {
    pub fn connect_with<C>(
        connector: &C,
        elements: ChatElements<F, L>,
        location: &PageLocation,
        config: &ChatConfig,
    ) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        // The username is read once here; later edits do not touch the
        // connection.
        let username_field = elements.username.value();
        let url = location.connection_url(&username_field, config)?;
        let connected_as = if username_field.is_empty() {
            config.default_username.clone()
        } else {
            username_field
        };

        log::info!(
            "Joining room '{}' as '{}' via {}",
            location.room_id(),
            connected_as,
            url
        );
        let (socket, events) = connector.connect(&url, &config.socket);

        Ok(Self {
            socket,
            events,
            elements,
            room_id: location.room_id().to_string(),
            url,
            connected_as,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn connection_url(&self) -> &Url {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.socket.ready_state()
    }

    pub fn elements(&self) -> &ChatElements<F, L> {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut ChatElements<F, L> {
        &mut self.elements
    }

    /// Send button clicked.
    pub fn on_send_click(&mut self) -> Result<bool> {
        self.send_message()
    }

    /// Key pressed while the message field has focus.
    pub fn on_key_press(&mut self, key: &str) -> Result<bool> {
        if key == "Enter" {
            return self.send_message();
        }
        Ok(false)
    }

    /// Send the message field's content. Returns whether a frame was sent.
    ///
    /// Empty or whitespace-only input is ignored. A socket that is not open
    /// fails with `NotOpen` and leaves the message field as typed.
    pub fn send_message(&mut self) -> Result<bool> {
        let username = self.elements.username.value().trim().to_string();
        let content = self.elements.message.value().trim().to_string();
        if username.is_empty() || content.is_empty() {
            return Ok(false);
        }

        if username != self.connected_as {
            log::debug!(
                "Sending as '{}' on a connection opened as '{}'",
                username,
                self.connected_as
            );
        }

        let frame = OutboundMessage::new(username, content).to_json()?;
        self.socket.send(frame)?;
        self.elements.message.set_value("");
        Ok(true)
    }

    /// Process every pending socket event. Stops at the first error, leaving
    /// later events queued.
    pub fn pump(&mut self) -> Result<usize> {
        let mut processed = 0;
        while let Some(event) = self.events.try_recv() {
            self.handle_event(event)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Wait up to `timeout` for one socket event and process it.
    pub fn wait_event(&mut self, timeout: Duration) -> Result<bool> {
        match self.events.recv_timeout(timeout) {
            Some(event) => {
                self.handle_event(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn handle_event(&mut self, event: SocketEvent) -> Result<()> {
        match event {
            SocketEvent::Open => {
                log::info!("Connected to room '{}'", self.room_id);
            }
            SocketEvent::Message(text) => {
                let message = InboundMessage::decode(&text).map_err(|e| {
                    log::error!(
                        "Dropping frame in room '{}' ({}): {}",
                        self.room_id,
                        e.error_kind(),
                        e
                    );
                    e
                })?;
                self.display_message(&message);
            }
            SocketEvent::Error(message) => {
                log::error!("Socket error in room '{}': {}", self.room_id, message);
            }
            SocketEvent::Close { code, reason } => {
                log::info!(
                    "Disconnected from room '{}' ({} {})",
                    self.room_id,
                    code,
                    reason
                );
            }
        }
        Ok(())
    }

    /// Append a message to the container and scroll to it.
    pub fn display_message(&mut self, message: &InboundMessage) {
        let messages = &mut self.elements.messages;
        messages.append(MessageNode::from(message));
        let bottom = messages.scroll_height();
        messages.set_scroll_top(bottom);
    }

    /// Close the socket with a normal closure.
    pub fn close(&self) {
        self.socket.close(1000, "");
    }
}
