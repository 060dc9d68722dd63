//! In-memory elements for hosts without a document, and for tests.

use crate::view::{MessageList, MessageNode, TextField};

/// A text input backed by a `String`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputField {
    value: String,
}

impl InputField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl TextField for InputField {
    fn value(&self) -> String {
        self.value.clone()
    }

    fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
    }
}

/// A message container that keeps every node and measures its content in
/// lines.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    nodes: Vec<MessageNode>,
    scroll_top: usize,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[MessageNode] {
        &self.nodes
    }

    pub fn last(&self) -> Option<&MessageNode> {
        self.nodes.last()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl MessageList for MessageLog {
    fn append(&mut self, node: MessageNode) {
        self.nodes.push(node);
    }

    fn scroll_height(&self) -> usize {
        self.nodes.iter().map(MessageNode::line_count).sum()
    }

    fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, top: usize) {
        self.scroll_top = top.min(self.scroll_height());
    }
}
