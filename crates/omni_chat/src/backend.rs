//! Blocking facade over the Omni HTTP collaborators.
//!
//! The console drives everything from one thread, so each call runs the async
//! client to completion on a private current-thread runtime.

use std::fs;
use std::path::Path;

use omni_api::{BrainCatalog, ChatRequest, ExecuteRequest, OmniApiClient, OmniApiConfig};
use tokio::runtime::Runtime;
use tracing::debug;

/// Request/response operations the console issues outside streamed turns.
///
/// Errors are user-facing strings; the host prints them as notices.
pub trait Backend {
    fn brains(&mut self) -> Result<BrainCatalog, String>;

    fn chat(&mut self, message: &str, brain: &str) -> Result<String, String>;

    fn execute(&mut self, request: &ExecuteRequest) -> Result<String, String>;

    fn transcribe(&mut self, audio: &Path) -> Result<String, String>;

    fn describe_image(&mut self, image: &Path, prompt: &str) -> Result<String, String>;

    /// Synthesizes `text` and writes the audio to `out`, returning the byte count.
    fn speak_to_file(&mut self, text: &str, out: &Path) -> Result<usize, String>;
}

pub struct ApiBackend {
    client: OmniApiClient,
    runtime: Runtime,
}

impl ApiBackend {
    pub fn new(config: OmniApiConfig) -> Result<Self, String> {
        let client = OmniApiClient::new(config).map_err(|error| error.to_string())?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("failed to initialize tokio runtime: {error}"))?;
        Ok(Self { client, runtime })
    }

    pub fn client(&self) -> &OmniApiClient {
        &self.client
    }
}

impl Backend for ApiBackend {
    fn brains(&mut self) -> Result<BrainCatalog, String> {
        self.runtime
            .block_on(self.client.brains())
            .map_err(|error| error.to_string())
    }

    fn chat(&mut self, message: &str, brain: &str) -> Result<String, String> {
        let request = ChatRequest::new(message, brain);
        self.runtime
            .block_on(self.client.chat(&request))
            .map_err(|error| error.to_string())
    }

    fn execute(&mut self, request: &ExecuteRequest) -> Result<String, String> {
        debug!(filename = %request.filename, language = %request.language, "executing artifact");
        self.runtime
            .block_on(self.client.execute(request))
            .map_err(|error| error.to_string())
    }

    fn transcribe(&mut self, audio: &Path) -> Result<String, String> {
        self.runtime
            .block_on(self.client.transcribe(audio))
            .map_err(|error| error.to_string())
    }

    fn describe_image(&mut self, image: &Path, prompt: &str) -> Result<String, String> {
        self.runtime
            .block_on(self.client.describe_image(image, prompt))
            .map_err(|error| error.to_string())
    }

    fn speak_to_file(&mut self, text: &str, out: &Path) -> Result<usize, String> {
        let audio = self
            .runtime
            .block_on(self.client.speak(text))
            .map_err(|error| error.to_string())?;
        fs::write(out, &audio)
            .map_err(|error| format!("failed to write {}: {error}", out.display()))?;
        Ok(audio.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_non_http_base_url() {
        let error = match ApiBackend::new(OmniApiConfig::new("ftp://omni.local")) {
            Ok(_) => panic!("ftp base URL should be rejected"),
            Err(error) => error,
        };
        assert!(!error.is_empty());
    }

    #[test]
    fn new_accepts_default_base_url() {
        let backend = ApiBackend::new(OmniApiConfig::new("http://127.0.0.1:8000"))
            .expect("default base URL should build");
        assert_eq!(backend.client().base_url().as_str(), "http://127.0.0.1:8000/");
    }
}
