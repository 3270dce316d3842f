//! Per-conversation state mutated by the interpreter.
//!
//! Invariants:
//! - at most one message is the streaming target, and only while `loading`;
//! - the code buffer is non-empty only while `mode == Mode::Code`;
//! - `loc_session` never decreases within a turn.

use crate::core::artifacts::ArtifactCollector;
use crate::core::code::CodeAccumulator;
use crate::core::counters::SessionCounters;
use crate::core::fence::Mode;
use crate::core::frame::ArtifactDescriptor;
use crate::core::message::{Message, MessageStore, Role};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    messages: MessageStore,
    code: CodeAccumulator,
    artifacts: ArtifactCollector,
    counters: SessionCounters,
    mode: Mode,
    loading: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.messages()
    }

    pub fn message_store(&self) -> &MessageStore {
        &self.messages
    }

    pub fn code(&self) -> &CodeAccumulator {
        &self.code
    }

    pub fn code_buffer(&self) -> &str {
        self.code.buffer()
    }

    pub fn artifacts(&self) -> &ArtifactCollector {
        &self.artifacts
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn active_agent(&self) -> &str {
        self.counters.active_agent()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(Role::System, content));
    }

    /// Records a user message outside a streamed turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(Role::Assistant, content));
    }

    /// Records the user's prompt and resets per-turn state.
    pub fn begin_turn(&mut self, prompt: impl Into<String>) {
        self.messages.push(Message::new(Role::User, prompt));
        self.mode = Mode::Prose;
        self.code.clear();
        self.counters.start_turn();
        self.loading = true;
    }

    /// Opens the assistant message that streamed prose is appended to.
    pub fn start_stream(&mut self) {
        if self.loading && !self.messages.is_streaming() {
            self.messages.open_assistant();
        }
    }

    pub(crate) fn append_prose(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.start_stream();
        self.messages.append_to_target(text);
    }

    pub(crate) fn append_code(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let lines = self.code.append(text);
        self.counters.add_lines(lines);
    }

    pub(crate) fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        match self.mode {
            Mode::Code => self.code.open_region(),
            Mode::Prose => self.code.close_region(),
        }
    }

    pub(crate) fn set_active_agent(&mut self, agent: impl Into<String>) {
        self.counters.set_active_agent(agent);
    }

    pub(crate) fn collect_artifacts(&mut self, list: Vec<ArtifactDescriptor>) {
        self.artifacts.extend(list);
        self.code.clear();
        self.mode = Mode::Prose;
    }

    /// Completes the turn: freezes the reply and returns to prose.
    pub(crate) fn finish_turn(&mut self) {
        if self.mode == Mode::Code {
            self.code.close_region();
        }
        self.mode = Mode::Prose;
        self.messages.freeze();
        self.loading = false;
    }

    /// Abandons the turn without reporting anything.
    pub fn cancel_turn(&mut self) {
        self.mode = Mode::Prose;
        self.code.clear();
        self.messages.freeze();
        self.loading = false;
    }

    /// Abandons the turn and reports `reason` as a system message.
    pub fn fail_turn(&mut self, reason: &str) {
        self.cancel_turn();
        self.push_system(format!("Error: {reason}"));
    }

    /// Drops transcript and artifacts; counters and agent label are kept.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.artifacts.clear();
        self.code.clear();
        self.mode = Mode::Prose;
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_turn_resets_turn_state_but_keeps_totals() {
        let mut session = Session::new();
        session.begin_turn("one");
        session.toggle_mode();
        session.append_code("a\nb\n");
        session.finish_turn();

        session.begin_turn("two");
        assert!(session.is_loading());
        assert_eq!(session.mode(), Mode::Prose);
        assert_eq!(session.code_buffer(), "");
        assert_eq!(session.counters().loc_session(), 0);
        assert_eq!(session.counters().loc_total(), 2);
    }

    #[test]
    fn fail_turn_reports_system_message_and_stops_loading() {
        let mut session = Session::new();
        session.begin_turn("hi");
        session.fail_turn("connection refused");

        assert!(!session.is_loading());
        assert_eq!(
            session.messages().last(),
            Some(&Message::new(Role::System, "Error: connection refused"))
        );
    }

    #[test]
    fn prose_without_open_turn_is_not_recorded() {
        let mut session = Session::new();
        session.append_prose("stray");
        assert!(session.messages().is_empty());
    }
}
