use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::OmniApiConfig;
use crate::error::{parse_error_message, OmniApiError};
use crate::payload::{
    BrainCatalog, ChatRequest, ChatResponse, ExecuteRequest, ExecuteResponse, SpeakRequest,
    TranscriptionResponse, VisionResponse,
};
use crate::retry::{is_retryable_http_error, retry_delay};
use crate::url::{endpoint_url, normalize_base_url};

#[derive(Debug)]
pub struct OmniApiClient {
    http: Client,
    config: OmniApiConfig,
    base_url: Url,
}

impl OmniApiClient {
    pub fn new(config: OmniApiConfig) -> Result<Self, OmniApiError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder.build().map_err(OmniApiError::from)?;
        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    pub fn config(&self) -> &OmniApiConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, OmniApiError> {
        endpoint_url(&self.base_url, path)
    }

    /// `GET /brains`.
    pub async fn brains(&self) -> Result<BrainCatalog, OmniApiError> {
        let url = self.endpoint("brains")?;
        let response = self
            .send_with_retry(|| Ok(self.http.get(url.clone())))
            .await?;
        read_json(response).await
    }

    /// `POST /chat`: one-shot, non-streaming reply.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, OmniApiError> {
        let url = self.endpoint("chat")?;
        let response = self
            .send_with_retry(|| Ok(self.http.post(url.clone()).json(request)))
            .await?;
        Ok(read_json::<ChatResponse>(response).await?.response)
    }

    /// `POST /execute`: runs a saved artifact and returns its log.
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<String, OmniApiError> {
        let url = self.endpoint("execute")?;
        let response = self
            .send_with_retry(|| Ok(self.http.post(url.clone()).json(request)))
            .await?;
        Ok(read_json::<ExecuteResponse>(response).await?.log)
    }

    /// `POST /voice`: uploads an audio file and returns its transcription.
    pub async fn transcribe(&self, audio: &Path) -> Result<String, OmniApiError> {
        let url = self.endpoint("voice")?;
        let (name, bytes) = read_upload(audio).await?;
        let response = self
            .send_with_retry(|| {
                let part = Part::bytes(bytes.clone())
                    .file_name(name.clone())
                    .mime_str("audio/wav")?;
                Ok(self
                    .http
                    .post(url.clone())
                    .multipart(Form::new().part("file", part)))
            })
            .await?;
        Ok(read_json::<TranscriptionResponse>(response)
            .await?
            .transcription)
    }

    /// `POST /vision`: uploads an image with a prompt and returns the description.
    pub async fn describe_image(&self, image: &Path, prompt: &str) -> Result<String, OmniApiError> {
        let url = self.endpoint("vision")?;
        let (name, bytes) = read_upload(image).await?;
        let mime = image_mime(&name);
        let response = self
            .send_with_retry(|| {
                let part = Part::bytes(bytes.clone())
                    .file_name(name.clone())
                    .mime_str(mime)?;
                let form = Form::new()
                    .part("file", part)
                    .text("prompt", prompt.to_string());
                Ok(self.http.post(url.clone()).multipart(form))
            })
            .await?;
        Ok(read_json::<VisionResponse>(response).await?.description)
    }

    /// `POST /speak`: returns synthesized WAV bytes.
    pub async fn speak(&self, text: &str) -> Result<Vec<u8>, OmniApiError> {
        let url = self.endpoint("speak")?;
        let request = SpeakRequest {
            text: text.to_string(),
        };
        let response = self
            .send_with_retry(|| Ok(self.http.post(url.clone()).json(&request)))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Sends the request built by `build`, retrying only failures where the
    /// backend never handled the request (connect errors, 429/502/503/504).
    pub async fn send_with_retry<F>(&self, build: F) -> Result<Response, OmniApiError>
    where
        F: Fn() -> Result<RequestBuilder, OmniApiError>,
    {
        let max_retries = self.config.max_retries;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match build()?.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let message = parse_error_message(status, &body);

                    if attempt < max_retries && is_retryable_http_error(status.as_u16(), &body) {
                        debug!(attempt, %status, %message, "retrying backend request");
                        last_status = Some(status);
                        last_error = Some(message);
                        tokio::time::sleep(retry_delay(self.config.retry_base_delay, attempt))
                            .await;
                        continue;
                    }

                    return Err(OmniApiError::Status(status, message));
                }
                Err(error) if error.is_connect() => {
                    last_error = Some(error.to_string());
                    if attempt < max_retries {
                        debug!(attempt, %error, "backend unreachable, retrying");
                        tokio::time::sleep(retry_delay(self.config.retry_base_delay, attempt))
                            .await;
                        continue;
                    }
                }
                Err(error) => return Err(OmniApiError::Request(error)),
            }
        }

        warn!(attempts = max_retries + 1, "backend request retries exhausted");
        Err(OmniApiError::RetryExhausted {
            attempts: max_retries + 1,
            status: last_status,
            last_error,
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, OmniApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(OmniApiError::from)
}

async fn read_upload(path: &Path) -> Result<(String, Vec<u8>), OmniApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| OmniApiError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok((name, bytes))
}

fn image_mime(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
