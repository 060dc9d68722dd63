use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Events pushed from the socket thread to the owning thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    /// A text frame.
    Message(String),
    Error(String),
    Close { code: u16, reason: String },
}

impl SocketEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Close { .. } => "close",
        }
    }
}

/// Handle used by the socket thread to push events.
#[derive(Clone)]
pub struct EventDispatcher {
    id: u32,
    tx: Sender<SocketEvent>,
}

impl EventDispatcher {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn dispatch(&self, event: SocketEvent) {
        log::debug!("[WebSocket {}] Dispatching {} event", self.id, event.kind());
        if let Err(e) = self.tx.send(event) {
            log::warn!(
                "[WebSocket {}] No receiver for {} event",
                self.id,
                e.0.kind()
            );
        }
    }

    /// Report a failure: an `error` event followed by an abnormal `close`.
    pub fn fail(&self, message: impl Into<String>, reason: &str) {
        self.dispatch(SocketEvent::Error(message.into()));
        self.dispatch(SocketEvent::Close {
            code: 1006,
            reason: reason.to_string(),
        });
    }
}

/// Receiving end, owned by the thread that renders the chat.
pub struct SocketEvents {
    rx: Receiver<SocketEvent>,
}

impl SocketEvents {
    pub fn channel(id: u32) -> (EventDispatcher, SocketEvents) {
        let (tx, rx) = mpsc::channel();
        (EventDispatcher { id, tx }, SocketEvents { rx })
    }

    /// Try to receive the next event without blocking
    pub fn try_recv(&self) -> Option<SocketEvent> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SocketEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_order() {
        let (dispatcher, events) = SocketEvents::channel(4);
        assert_eq!(dispatcher.id(), 4);
        dispatcher.dispatch(SocketEvent::Open);
        dispatcher.fail("boom", "Connection error");

        assert_eq!(events.try_recv(), Some(SocketEvent::Open));
        assert_eq!(events.try_recv(), Some(SocketEvent::Error("boom".to_string())));
        assert_eq!(
            events.try_recv(),
            Some(SocketEvent::Close {
                code: 1006,
                reason: "Connection error".to_string()
            })
        );
        assert_eq!(events.try_recv(), None);
    }

    #[test]
    fn test_dispatch_without_receiver_does_not_panic() {
        let (dispatcher, events) = SocketEvents::channel(1);
        drop(events);
        dispatcher.dispatch(SocketEvent::Message("lost".to_string()));
    }
}
