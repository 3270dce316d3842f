//! Token stream interpreter.
//!
//! Applies frames to a [`Session`] one at a time, in arrival order. Token text
//! is split at fence markers; prose goes to the streaming assistant message,
//! code goes to the code accumulator and the line counters.

use thiserror::Error;
use tracing::{debug, trace};

use crate::core::fence::{FenceScanner, Mode, Piece};
use crate::core::frame::Frame;
use crate::session::Session;

/// Result of applying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Continue,
    Done,
}

/// Frame that cannot apply to the session's current state. Callers ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("'{kind}' frame received with no active turn")]
    NoActiveTurn { kind: &'static str },
}

#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    scanner: FenceScanner,
}

impl Interpreter {
    pub fn new(fence_marker: impl Into<String>) -> Self {
        Self {
            scanner: FenceScanner::new(fence_marker),
        }
    }

    /// Partial marker held back from the previous token, if any.
    pub fn pending_marker(&self) -> &str {
        self.scanner.pending()
    }

    /// Drops scanning state. Called at turn start and on cancellation.
    pub fn reset(&mut self) {
        self.scanner.reset();
    }

    /// Starts a turn: resets scanning state and the session's per-turn state.
    pub fn begin_turn(&mut self, session: &mut Session, prompt: impl Into<String>) {
        self.reset();
        session.begin_turn(prompt);
    }

    pub fn apply(&mut self, session: &mut Session, frame: Frame) -> Result<Applied, StateError> {
        if let Frame::BrainUpdate { agent_name } = frame {
            debug!(agent = %agent_name, "active agent changed");
            session.set_active_agent(agent_name);
            return Ok(Applied::Continue);
        }

        if !session.is_loading() {
            return Err(StateError::NoActiveTurn { kind: frame.kind() });
        }

        match frame {
            Frame::Token { text } => {
                for piece in self.scanner.scan(&text) {
                    dispatch(session, piece);
                }
                Ok(Applied::Continue)
            }
            Frame::Artifacts { list } => {
                self.flush_pending(session);
                debug!(count = list.len(), "artifacts collected");
                session.collect_artifacts(list);
                Ok(Applied::Continue)
            }
            Frame::Done => {
                self.flush_pending(session);
                session.finish_turn();
                debug!(
                    loc_session = session.counters().loc_session(),
                    "turn finished"
                );
                Ok(Applied::Done)
            }
            Frame::BrainUpdate { .. } => Ok(Applied::Continue),
        }
    }

    fn flush_pending(&mut self, session: &mut Session) {
        if let Some(text) = self.scanner.flush() {
            dispatch(session, Piece::Text(text));
        }
    }
}

fn dispatch(session: &mut Session, piece: Piece) {
    match piece {
        Piece::Marker => {
            session.toggle_mode();
            trace!(mode = session.mode().as_str(), "fence marker");
        }
        Piece::Text(text) => match session.mode() {
            Mode::Prose => session.append_prose(&text),
            Mode::Code => session.append_code(&text),
        },
    }
}
