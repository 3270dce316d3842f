use omni_stream::ArtifactDescriptor;
use serde::{Deserialize, Serialize};

/// `GET /brains` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrainCatalog {
    #[serde(default)]
    pub installed: Vec<String>,
    #[serde(default)]
    pub available: Vec<String>,
}

impl BrainCatalog {
    pub fn first_installed(&self) -> Option<&str> {
        self.installed.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub brain: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, brain: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            brain: brain.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub filename: String,
    pub language: String,
}

impl ExecuteRequest {
    pub fn new(filename: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            language: language.into(),
        }
    }
}

impl From<&ArtifactDescriptor> for ExecuteRequest {
    fn from(artifact: &ArtifactDescriptor) -> Self {
        Self::new(artifact.filename.clone(), artifact.language.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub transcription: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionResponse {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}
