//! Deterministic scripted implementation of the shared `omni_transport` contract.
//!
//! This crate contains no network logic and is intended for local
//! development and contract-level integration testing of the console host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use omni_stream::{decode_frame, ArtifactDescriptor, Frame};
use omni_transport::{CancelSignal, FrameTransport, TransportEvent, TransportProfile, TurnRequest};

/// Stable transport identifier used for explicit startup selection.
pub const MOCK_TRANSPORT_ID: &str = "mock";

const CANCEL_POLL_MS: u64 = 10;

/// One scripted inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Frame(Frame),
    /// Raw wire text, decoded at replay time like a real socket message.
    Raw(String),
}

/// How a script ends once its steps are exhausted without a `done` frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptEnding {
    /// Server closes the connection.
    #[default]
    Close,
    /// Connection stays open until the turn is cancelled.
    HoldOpen,
}

/// Replays a fixed frame script for every turn.
#[derive(Debug)]
pub struct ScriptedTransport {
    steps: Vec<ScriptStep>,
    delay: Duration,
    ending: ScriptEnding,
    open_error: Option<String>,
    runs: AtomicUsize,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            delay: Duration::ZERO,
            ending: ScriptEnding::Close,
            open_error: None,
            runs: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self::new(frames.into_iter().map(ScriptStep::Frame).collect())
    }

    #[must_use]
    pub fn from_raw<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|text| ScriptStep::Raw(text.into()))
                .collect(),
        )
    }

    /// A transport whose connection attempt always fails.
    #[must_use]
    pub fn refusing(error: impl Into<String>) -> Self {
        let mut transport = Self::new(Vec::new());
        transport.open_error = Some(error.into());
        transport
    }

    /// Pause between scripted messages.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_ending(mut self, ending: ScriptEnding) -> Self {
        self.ending = ending;
        self
    }

    /// Number of turns this transport has been asked to run.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::from_frames(vec![
            Frame::BrainUpdate {
                agent_name: "@roe/backend".to_string(),
            },
            Frame::token("Here is a small script.\n\n"),
            Frame::token("``"),
            Frame::token("`\n#!/bin/sh\n"),
            Frame::token("echo \"hello from omni\"\n"),
            Frame::token("```"),
            Frame::token("\nSaved it for you."),
            Frame::Artifacts {
                list: vec![ArtifactDescriptor::new("hello.sh", "sh").with_path("workspace/hello.sh")],
            },
            Frame::Done,
        ])
        .with_delay(Duration::from_millis(40))
    }
}

impl FrameTransport for ScriptedTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: MOCK_TRANSPORT_ID.to_string(),
            endpoint: "script://".to_string(),
        }
    }

    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(TransportEvent),
    ) -> Result<(), String> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let turn_id = req.turn_id;

        if let Some(error) = &self.open_error {
            emit(TransportEvent::Failed {
                turn_id,
                error: error.clone(),
            });
            return Ok(());
        }

        emit(TransportEvent::Opened { turn_id });

        for step in &self.steps {
            self.pause();
            if cancel.load(Ordering::SeqCst) {
                emit(TransportEvent::Cancelled { turn_id });
                return Ok(());
            }

            let frame = match step {
                ScriptStep::Frame(frame) => frame.clone(),
                ScriptStep::Raw(raw) => match decode_frame(raw) {
                    Ok(frame) => frame,
                    Err(error) => {
                        emit(TransportEvent::Malformed {
                            turn_id,
                            raw: raw.clone(),
                            error: error.to_string(),
                        });
                        continue;
                    }
                },
            };

            let terminal = frame.is_terminal();
            emit(TransportEvent::Frame { turn_id, frame });
            if terminal {
                emit(TransportEvent::Closed { turn_id });
                return Ok(());
            }
        }

        if self.ending == ScriptEnding::HoldOpen {
            while !cancel.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(CANCEL_POLL_MS));
            }
            emit(TransportEvent::Cancelled { turn_id });
            return Ok(());
        }

        emit(TransportEvent::Closed { turn_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::*;

    fn request() -> TurnRequest {
        TurnRequest {
            turn_id: 7,
            message: "test".to_string(),
            brain: "None".to_string(),
        }
    }

    fn collect_events(transport: &ScriptedTransport, cancel: CancelSignal) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        transport
            .run(request(), cancel, &mut |event| events.push(event))
            .expect("scripted run should succeed");
        events
    }

    #[test]
    fn profile_exposes_explicit_mock_identity() {
        let profile = ScriptedTransport::new(Vec::new()).profile();
        assert_eq!(profile.transport_id, MOCK_TRANSPORT_ID);
    }

    #[test]
    fn run_emits_opened_frames_and_closes_after_done() {
        let transport = ScriptedTransport::from_frames(vec![
            Frame::token("hi"),
            Frame::Done,
            Frame::token("never sent"),
        ]);

        let events = collect_events(&transport, Arc::new(AtomicBool::new(false)));

        assert_eq!(
            events,
            vec![
                TransportEvent::Opened { turn_id: 7 },
                TransportEvent::Frame {
                    turn_id: 7,
                    frame: Frame::token("hi"),
                },
                TransportEvent::Frame {
                    turn_id: 7,
                    frame: Frame::Done,
                },
                TransportEvent::Closed { turn_id: 7 },
            ]
        );
        assert_eq!(transport.run_count(), 1);
    }

    #[test]
    fn raw_steps_decode_and_report_malformed_text() {
        let transport = ScriptedTransport::from_raw([
            r#"{"type":"token","content":"a"}"#,
            "not json",
            r#"{"type":"done"}"#,
        ]);

        let events = collect_events(&transport, Arc::new(AtomicBool::new(false)));

        assert!(matches!(
            &events[2],
            TransportEvent::Malformed { raw, .. } if raw == "not json"
        ));
        assert!(matches!(
            &events[3],
            TransportEvent::Frame { frame: Frame::Done, .. }
        ));
    }

    #[test]
    fn script_without_done_ends_with_close() {
        let transport = ScriptedTransport::from_frames(vec![Frame::token("partial")]);
        let events = collect_events(&transport, Arc::new(AtomicBool::new(false)));
        assert_eq!(events.last(), Some(&TransportEvent::Closed { turn_id: 7 }));
    }

    #[test]
    fn run_emits_cancelled_when_cancel_is_set() {
        let transport = ScriptedTransport::from_frames(vec![Frame::token("ignored"), Frame::Done]);
        let events = collect_events(&transport, Arc::new(AtomicBool::new(true)));

        assert_eq!(
            events,
            vec![
                TransportEvent::Opened { turn_id: 7 },
                TransportEvent::Cancelled { turn_id: 7 },
            ]
        );
    }

    #[test]
    fn hold_open_waits_for_cancellation() {
        let transport = ScriptedTransport::from_frames(vec![Frame::token("thinking")])
            .with_ending(ScriptEnding::HoldOpen);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::SeqCst);
        });

        let events = collect_events(&transport, cancel);
        canceller.join().expect("canceller thread");

        assert_eq!(events.last(), Some(&TransportEvent::Cancelled { turn_id: 7 }));
    }

    #[test]
    fn refusing_transport_fails_without_opening() {
        let transport = ScriptedTransport::refusing("connection refused");
        let events = collect_events(&transport, Arc::new(AtomicBool::new(false)));

        assert_eq!(
            events,
            vec![TransportEvent::Failed {
                turn_id: 7,
                error: "connection refused".to_string(),
            }]
        );
    }

    #[test]
    fn default_script_ends_with_done() {
        let transport = ScriptedTransport::default().with_delay(Duration::ZERO);
        let events = collect_events(&transport, Arc::new(AtomicBool::new(false)));

        assert!(events.iter().any(|event| matches!(
            event,
            TransportEvent::Frame { frame: Frame::Artifacts { .. }, .. }
        )));
        assert_eq!(events.last(), Some(&TransportEvent::Closed { turn_id: 7 }));
    }
}
