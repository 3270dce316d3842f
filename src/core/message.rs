//! Ordered conversation transcript.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only message list. Only the streaming target (the last message,
/// while streaming is open) may be mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
    streaming: bool,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Appends a frozen message. Closes any open streaming target first.
    pub fn push(&mut self, message: Message) {
        self.streaming = false;
        self.messages.push(message);
    }

    /// Appends an empty assistant message and makes it the streaming target.
    pub fn open_assistant(&mut self) {
        self.messages.push(Message::new(Role::Assistant, String::new()));
        self.streaming = true;
    }

    /// Appends to the streaming target. Returns false when no target is open.
    pub fn append_to_target(&mut self, text: &str) -> bool {
        if !self.streaming {
            return false;
        }

        match self.messages.last_mut() {
            Some(message) => {
                message.content.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Content of the streaming target, if one is open.
    pub fn target(&self) -> Option<&Message> {
        if self.streaming {
            self.messages.last()
        } else {
            None
        }
    }

    /// Freezes the streaming target.
    pub fn freeze(&mut self) {
        self.streaming = false;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_target_accepts_appends() {
        let mut store = MessageStore::new();
        store.push(Message::new(Role::User, "hi"));
        assert!(!store.append_to_target("ignored"));

        store.open_assistant();
        assert!(store.append_to_target("Hello"));
        assert!(store.append_to_target(" there"));
        store.freeze();
        assert!(!store.append_to_target("late"));

        assert_eq!(
            store.messages(),
            &[
                Message::new(Role::User, "hi"),
                Message::new(Role::Assistant, "Hello there"),
            ]
        );
    }

    #[test]
    fn pushing_a_message_closes_the_streaming_target() {
        let mut store = MessageStore::new();
        store.open_assistant();
        store.push(Message::new(Role::System, "Error: refused"));
        assert!(!store.is_streaming());
        assert!(store.target().is_none());
    }
}
