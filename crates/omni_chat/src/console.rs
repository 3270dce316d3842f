//! Incremental plain-text rendering of a [`Session`].

use std::io::{self, Write};

use omni_stream::{Role, Session};

/// Prints what changed in a session since the previous call.
///
/// The streaming assistant message is written as it grows, without a
/// trailing newline until it is frozen.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    next_message: usize,
    printed_bytes: usize,
    prefix_written: bool,
    printed_artifacts: usize,
    was_loading: bool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, session: &Session, out: &mut dyn Write) -> io::Result<()> {
        let messages = session.messages();
        if messages.len() < self.next_message {
            // Transcript was cleared.
            self.next_message = 0;
            self.printed_bytes = 0;
            self.prefix_written = false;
        }
        if session.artifacts().len() < self.printed_artifacts {
            self.printed_artifacts = 0;
        }

        let streaming = session.message_store().is_streaming();
        let last_index = messages.len().saturating_sub(1);

        for (index, message) in messages.iter().enumerate().skip(self.next_message) {
            let open = streaming && index == last_index;
            if open && message.content.is_empty() {
                break;
            }

            // Prompts are already on screen as typed input.
            let echo = message.role != Role::User;
            if echo {
                if !self.prefix_written {
                    write!(out, "{}", prefix(message.role, session.active_agent()))?;
                    self.prefix_written = true;
                }
                let unseen = message.content.get(self.printed_bytes..).unwrap_or("");
                out.write_all(unseen.as_bytes())?;
                self.printed_bytes = message.content.len();
            }

            if open {
                break;
            }

            if echo {
                writeln!(out)?;
            }
            self.next_message = index + 1;
            self.printed_bytes = 0;
            self.prefix_written = false;
        }

        let artifacts = session.artifacts().all();
        for artifact in &artifacts[self.printed_artifacts..] {
            writeln!(out, "  + {} ({})", artifact.filename, artifact.language)?;
        }
        self.printed_artifacts = artifacts.len();

        let loading = session.is_loading();
        if self.was_loading && !loading {
            let counters = session.counters();
            writeln!(
                out,
                "[{}] +{} lines ({} total)",
                counters.active_agent(),
                counters.loc_session(),
                counters.loc_total()
            )?;
        }
        self.was_loading = loading;

        out.flush()
    }
}

fn prefix(role: Role, agent: &str) -> String {
    match role {
        Role::Assistant => format!("{agent}> "),
        Role::System => "! ".to_string(),
        Role::User => "> ".to_string(),
    }
}
