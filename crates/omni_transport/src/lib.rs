//! Minimal transport-agnostic contract for streaming one conversational turn.
//!
//! This crate defines only the turn lifecycle shared by transports and the
//! host. It excludes wire encoding, connection details, and turn scheduling.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use omni_stream::{Frame, ProtocolError, RequestFrame};

/// Identifier for one turn.
pub type TurnId = u64;

/// Shared cancellation flag for a turn.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing a transport, before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInitError {
    message: String,
}

impl TransportInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportInitError {}

impl From<String> for TransportInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TransportInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Input required to open a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub message: String,
    pub brain: String,
}

impl TurnRequest {
    /// The request frame sent as soon as the connection opens.
    #[must_use]
    pub fn request_frame(&self) -> RequestFrame {
        RequestFrame::new(self.message.clone(), self.brain.clone())
    }
}

/// Encodes the opening `{message, brain}` frame for `req`.
pub fn encode_request(req: &TurnRequest) -> Result<String, ProtocolError> {
    req.request_frame().encode()
}

/// Transport-emitted lifecycle event for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection is open and the request frame has been sent.
    Opened { turn_id: TurnId },
    Frame { turn_id: TurnId, frame: Frame },
    /// Inbound message that did not decode. Not terminal.
    Malformed {
        turn_id: TurnId,
        raw: String,
        error: String,
    },
    /// Remote side closed the connection.
    Closed { turn_id: TurnId },
    Failed { turn_id: TurnId, error: String },
    Cancelled { turn_id: TurnId },
}

impl TransportEvent {
    #[must_use]
    pub fn turn_id(&self) -> TurnId {
        match self {
            Self::Opened { turn_id }
            | Self::Frame { turn_id, .. }
            | Self::Malformed { turn_id, .. }
            | Self::Closed { turn_id }
            | Self::Failed { turn_id, .. }
            | Self::Cancelled { turn_id } => *turn_id,
        }
    }

    /// Returns true when this event ends the connection lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Closed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportProfile {
    pub transport_id: String,
    pub endpoint: String,
}

/// Transport interface for streaming one turn.
pub trait FrameTransport: Send + Sync + 'static {
    fn profile(&self) -> TransportProfile;

    /// Opens one connection, sends the request frame, and emits events in
    /// arrival order until the connection ends.
    ///
    /// Implementations emit exactly one terminal event, check `cancel`
    /// between reads, and close the connection before returning. An `Err`
    /// return is reported by the caller as a failed turn.
    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(TransportEvent),
    ) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalTransport;

    impl FrameTransport for MinimalTransport {
        fn profile(&self) -> TransportProfile {
            TransportProfile {
                transport_id: "minimal".to_string(),
                endpoint: "memory://".to_string(),
            }
        }

        fn run(
            &self,
            req: TurnRequest,
            _cancel: CancelSignal,
            emit: &mut dyn FnMut(TransportEvent),
        ) -> Result<(), String> {
            emit(TransportEvent::Opened {
                turn_id: req.turn_id,
            });
            emit(TransportEvent::Frame {
                turn_id: req.turn_id,
                frame: Frame::Done,
            });
            emit(TransportEvent::Closed {
                turn_id: req.turn_id,
            });
            Ok(())
        }
    }

    #[test]
    fn transport_event_turn_id_returns_event_turn_id() {
        let turn_id = 42;
        let events = [
            TransportEvent::Opened { turn_id },
            TransportEvent::Frame {
                turn_id,
                frame: Frame::token("partial"),
            },
            TransportEvent::Malformed {
                turn_id,
                raw: "{".to_string(),
                error: "eof".to_string(),
            },
            TransportEvent::Closed { turn_id },
            TransportEvent::Failed {
                turn_id,
                error: "refused".to_string(),
            },
            TransportEvent::Cancelled { turn_id },
        ];

        for event in events {
            assert_eq!(event.turn_id(), turn_id);
        }
    }

    #[test]
    fn terminal_detection_matches_lifecycle() {
        assert!(!TransportEvent::Opened { turn_id: 1 }.is_terminal());
        assert!(!TransportEvent::Frame {
            turn_id: 1,
            frame: Frame::Done,
        }
        .is_terminal());
        assert!(!TransportEvent::Malformed {
            turn_id: 1,
            raw: String::new(),
            error: String::new(),
        }
        .is_terminal());
        assert!(TransportEvent::Closed { turn_id: 1 }.is_terminal());
        assert!(TransportEvent::Failed {
            turn_id: 1,
            error: "boom".to_string(),
        }
        .is_terminal());
        assert!(TransportEvent::Cancelled { turn_id: 1 }.is_terminal());
    }

    #[test]
    fn init_error_preserves_message() {
        let error = TransportInitError::new("bad url");
        assert_eq!(error.message(), "bad url");
        assert_eq!(error.to_string(), "bad url");
    }

    #[test]
    fn request_frame_carries_message_and_brain() {
        let request = TurnRequest {
            turn_id: 7,
            message: "build it".to_string(),
            brain: "architect".to_string(),
        };
        assert_eq!(request.request_frame(), RequestFrame::new("build it", "architect"));
        assert_eq!(
            encode_request(&request).unwrap(),
            r#"{"message":"build it","brain":"architect"}"#
        );
    }

    #[test]
    fn minimal_transport_emits_single_terminal_event() {
        let transport = MinimalTransport;
        let mut events = Vec::new();
        transport
            .run(
                TurnRequest {
                    turn_id: 3,
                    message: "hi".to_string(),
                    brain: "None".to_string(),
                },
                Arc::new(AtomicBool::new(false)),
                &mut |event| events.push(event),
            )
            .unwrap();

        assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
        assert_eq!(transport.profile().transport_id, "minimal");
    }
}
