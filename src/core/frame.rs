//! Wire frames exchanged with the Omni backend.
//!
//! Inbound frames are one JSON object per message:
//! `{"type": "token" | "brain_update" | "artifacts" | "done", "content"?, "brain"?, "data"?}`.
//! The outbound request frame sent on open is `{"message", "brain"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Generated-file descriptor surfaced by the backend after code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, alias = "lang")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// Saved file body, when the backend echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ArtifactDescriptor {
    pub fn new(filename: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            path: String::new(),
            language: language.into(),
            length: None,
            content: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Lower-cased extension of `filename`, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// One decoded protocol event from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Token { text: String },
    BrainUpdate { agent_name: String },
    Artifacts { list: Vec<ArtifactDescriptor> },
    Done,
}

impl Frame {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::BrainUpdate { .. } => "brain_update",
            Self::Artifacts { .. } => "artifacts",
            Self::Done => "done",
        }
    }

    /// Returns true when this frame ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Initial request frame sent immediately after a connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub message: String,
    pub brain: String,
}

impl RequestFrame {
    pub fn new(message: impl Into<String>, brain: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            brain: brain.into(),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Json)
    }
}

/// A frame that could not be decoded. Never fatal: callers log and skip.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("unknown frame type '{0}'")]
    UnknownType(String),

    #[error("'{kind}' frame is missing field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("'artifacts' frame has an invalid descriptor list: {0}")]
    InvalidArtifacts(#[source] serde_json::Error),
}

/// Decodes one text message into a [`Frame`].
pub fn decode_frame(text: &str) -> Result<Frame, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::Json)?;
    map_frame(value)
}

fn map_frame(value: Value) -> Result<Frame, ProtocolError> {
    let Value::Object(mut object) = value else {
        return Err(ProtocolError::NotAnObject);
    };
    let kind = match object.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_owned(),
        None => return Err(ProtocolError::MissingType),
    };

    match kind.as_str() {
        "token" => {
            let text = string_field(&object, "content").ok_or(ProtocolError::MissingField {
                kind: "token",
                field: "content",
            })?;
            Ok(Frame::Token { text })
        }
        "brain_update" => {
            let agent_name = string_field(&object, "brain")
                .or_else(|| string_field(&object, "content"))
                .ok_or(ProtocolError::MissingField {
                    kind: "brain_update",
                    field: "brain",
                })?;
            Ok(Frame::BrainUpdate { agent_name })
        }
        "artifacts" => {
            let data = object.remove("data").ok_or(ProtocolError::MissingField {
                kind: "artifacts",
                field: "data",
            })?;
            let list = serde_json::from_value::<Vec<ArtifactDescriptor>>(data)
                .map_err(ProtocolError::InvalidArtifacts)?;
            Ok(Frame::Artifacts { list })
        }
        "done" => Ok(Frame::Done),
        _ => Err(ProtocolError::UnknownType(kind)),
    }
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
