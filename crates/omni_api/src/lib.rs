//! HTTP client for the Omni backend's request/response collaborators.
//!
//! Streaming turns go over the WebSocket transport; everything here is a
//! single request with a JSON (or audio) response: brain catalog, one-shot
//! chat, artifact execution, transcription, image description and speech.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::OmniApiClient;
pub use config::OmniApiConfig;
pub use error::{parse_error_message, OmniApiError};
pub use payload::{
    BrainCatalog, ChatRequest, ChatResponse, ExecuteRequest, ExecuteResponse, SpeakRequest,
    TranscriptionResponse, VisionResponse,
};
pub use url::{endpoint_url, normalize_base_url, DEFAULT_API_BASE_URL};
