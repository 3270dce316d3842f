//! Streaming response interpreter for the Omni assistant.
//!
//! Invariant: frames are applied one at a time, in arrival order, by
//! [`Interpreter::apply`]; nothing else mutates a [`Session`] mid-turn.
//!
//! # Public API Overview
//! - Decode wire frames with [`decode_frame`] and build the opening request with [`RequestFrame`].
//! - Drive a turn with [`Session::begin_turn`], [`Session::start_stream`] and [`Interpreter::apply`].
//! - Inspect results through [`Session`]: transcript, code buffer, artifacts and counters.
//! - Pick the runnable artifact with [`ArtifactCollector::entry_point`].

pub mod config;
pub mod logging;

pub mod core;
pub mod interpreter;
pub mod session;

pub use crate::config::{EnvConfig, TransportKind};
pub use crate::core::artifacts::{entry_kind, ArtifactCollector, EntryKind};
pub use crate::core::code::{CodeAccumulator, CodeBlock};
pub use crate::core::counters::{SessionCounters, DEFAULT_AGENT};
pub use crate::core::fence::{FenceScanner, Mode, Piece, DEFAULT_FENCE_MARKER};
pub use crate::core::frame::{decode_frame, ArtifactDescriptor, Frame, ProtocolError, RequestFrame};
pub use crate::core::message::{Message, MessageStore, Role};
pub use crate::interpreter::{Applied, Interpreter, StateError};
pub use crate::session::Session;
