//! Console host for the Omni streaming assistant.
//!
//! ## Transport bootstrap
//!
//! `omni_chat` selects its transport from `OMNI_TRANSPORT`:
//!
//! - `ws` (default) streams turns over the backend's WebSocket endpoint,
//!   `OMNI_WS_URL` or the `/ws` path derived from `OMNI_API_URL`
//! - `mock` replays a fixed script for offline runs
//!
//! Request/response features (`/brains`, `/chat`, `/run`, `/vision`, `/voice`,
//! `/speak`) always go to `OMNI_API_URL` over HTTP.
//!
//! Turn contract: at most one connection is open at a time. A submit while a
//! reply streams is rejected, and events from a cancelled or expired turn are
//! dropped before they reach the session.

pub mod app;
pub mod backend;
pub mod commands;
pub mod console;
pub mod providers;
pub mod runtime;
