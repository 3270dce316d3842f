//! Line-of-code totals and the active-agent label.

/// Agent label before the backend reports one.
pub const DEFAULT_AGENT: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCounters {
    active_agent: String,
    loc_session: u64,
    loc_total: u64,
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self {
            active_agent: DEFAULT_AGENT.to_string(),
            loc_session: 0,
            loc_total: 0,
        }
    }
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_agent(&self) -> &str {
        &self.active_agent
    }

    pub fn set_active_agent(&mut self, agent: impl Into<String>) {
        self.active_agent = agent.into();
    }

    /// Lines of code streamed in the current turn.
    pub fn loc_session(&self) -> u64 {
        self.loc_session
    }

    /// Lines of code streamed since process start.
    pub fn loc_total(&self) -> u64 {
        self.loc_total
    }

    pub fn add_lines(&mut self, lines: usize) {
        let lines = u64::try_from(lines).unwrap_or(u64::MAX);
        self.loc_session = self.loc_session.saturating_add(lines);
        self.loc_total = self.loc_total.saturating_add(lines);
    }

    pub fn start_turn(&mut self) {
        self.loc_session = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_accumulates_across_turns_while_session_resets() {
        let mut counters = SessionCounters::new();
        counters.add_lines(3);
        counters.start_turn();
        counters.add_lines(2);

        assert_eq!(counters.loc_session(), 2);
        assert_eq!(counters.loc_total(), 5);
        assert_eq!(counters.active_agent(), DEFAULT_AGENT);
    }
}
