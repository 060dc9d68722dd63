//! # Chat view
//!
//! Binds a username field, a message field and a message container to one
//! socket. The host owns the elements and hands them to
//! [`ChatClientView::connect`]; the send button maps to
//! [`ChatClientView::on_send_click`] and key presses in the message field to
//! [`ChatClientView::on_key_press`].
//!
//! ## Example
//!
//! ```no_run
//! use room_chat::{ChatClientView, ChatConfig, ChatElements, PageLocation};
//! use room_chat::view::TextField;
//! use room_chat::view::memory::{InputField, MessageLog};
//!
//! let location = PageLocation::parse("http://localhost:8000/chat/room42")?;
//! let elements = ChatElements::new(
//!     InputField::new("alice"),
//!     InputField::default(),
//!     MessageLog::new(),
//! );
//! let mut view = ChatClientView::connect(elements, &location, &ChatConfig::default())?;
//!
//! view.elements_mut().message.set_value("hello");
//! view.on_send_click()?;
//! view.pump()?;
//! # Ok::<(), room_chat::ChatError>(())
//! ```

mod chat;
pub mod memory;
mod render;

pub use chat::ChatClientView;
pub use render::MessageNode;

/// A single-line text input.
pub trait TextField {
    fn value(&self) -> String;
    fn set_value(&mut self, value: &str);
}

/// The container rendered messages are appended to.
pub trait MessageList {
    fn append(&mut self, node: MessageNode);
    /// Full height of the content.
    fn scroll_height(&self) -> usize;
    fn scroll_top(&self) -> usize;
    fn set_scroll_top(&mut self, top: usize);
}

/// The elements the view binds to.
pub struct ChatElements<F, L> {
    pub username: F,
    pub message: F,
    pub messages: L,
}

impl<F: TextField, L: MessageList> ChatElements<F, L> {
    pub fn new(username: F, message: F, messages: L) -> Self {
        Self {
            username,
            message,
            messages,
        }
    }
}
