//! OpenAI Responses API client and the responder built on it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use batchquery_config::OpenAiProviderConfig;
use futures_util::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    simulated::SimulatedResponder,
    types::{validate_batch, BatchImage, BatchResult},
    BatchResponder, OrchestratorError,
};

pub const NO_TEXT_RETURNED: &str = "(No text returned)";

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status} {message}")]
    Api { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Authenticated handle on the vision endpoint. Built once from
/// configuration and shared by every batch.
#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl VisionClient {
    /// Returns `Ok(None)` when no credential is configured.
    pub fn from_config(config: &OpenAiProviderConfig) -> Result<Option<Self>, OrchestratorError> {
        let Some(api_key) = config.credential() else {
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Some(Self {
            http,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn ask(&self, image: &BatchImage, prompt: &str) -> Result<String, VisionError> {
        let url = format!("{}/responses", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": prompt },
                    { "type": "input_image", "image_url": data_url(image), "detail": "auto" },
                ],
            }],
        });

        debug!(image_id = %image.id, model = %self.model, bytes = image.bytes.len(), "sending vision request");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            return Err(VisionError::Api {
                status: status.as_u16(),
                message: api_error_message(&raw).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request rejected")
                        .to_string()
                }),
            });
        }

        let parsed: Value = serde_json::from_str(&raw)?;
        Ok(extract_output_text(&parsed).unwrap_or_else(|| NO_TEXT_RETURNED.to_string()))
    }
}

pub fn data_url(image: &BatchImage) -> String {
    format!("data:{};base64,{}", image.media_type, BASE64.encode(&image.bytes))
}

fn api_error_message(raw: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(raw).ok()?;
    parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Prefers the aggregated `output_text` (even when empty), falling back to
/// joining the `output_text` parts of each output message.
pub fn extract_output_text(response: &Value) -> Option<String> {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let parts: Vec<&str> = response
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Real responder. Without a vision client every batch is delegated to the
/// simulated responder.
pub struct OpenAiResponder {
    client: Option<Arc<VisionClient>>,
    fallback: Arc<SimulatedResponder>,
}

impl OpenAiResponder {
    pub fn new(client: Option<Arc<VisionClient>>, fallback: Arc<SimulatedResponder>) -> Self {
        Self { client, fallback }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl BatchResponder for OpenAiResponder {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn respond(
        &self,
        images: &[BatchImage],
        prompt: &str,
    ) -> Result<Vec<BatchResult>, OrchestratorError> {
        let Some(client) = self.client.as_ref() else {
            info!("no OpenAI credential configured, using simulated responder");
            return self.fallback.respond(images, prompt).await;
        };

        validate_batch(images, prompt)?;

        let tasks = images.iter().map(|image| {
            let client = Arc::clone(client);
            async move {
                match client.ask(image, prompt).await {
                    Ok(answer) => BatchResult::answer(&image.id, answer),
                    Err(error) => {
                        warn!(image_id = %image.id, %error, "vision request failed");
                        BatchResult::failure(&image.id, error.to_string())
                    }
                }
            }
        });

        Ok(join_all(tasks).await)
    }
}
