//! Core state types and the frame codec.

pub mod artifacts;
pub mod code;
pub mod counters;
pub mod fence;
pub mod frame;
pub mod message;
