//! # Gemini Client Module
//!
//! Thin wrapper around the Gemini `generateContent` REST endpoint for text
//! prompts and prompts with one inline image.
//!
//! Requests are retried with exponential backoff on transport errors and
//! 429/5xx answers, and guarded by a [`CircuitBreaker`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{BotConfig, GeminiConfig, RecoveryConfig};
use crate::vision_errors::VisionError;

/// Body of a `generateContent` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub safety_settings: Vec<SafetySetting>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a content block: either text or inline image data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineImage>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(image: InlineImage) -> Self {
        Self {
            text: None,
            inline_data: Some(image),
        }
    }
}

/// Base64-encoded image sent inline with the prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub stop_sequences: Vec<String>,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
}

/// Answer of a `generateContent` call
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map an image file extension to the mime type Gemini expects
///
/// # Examples
///
/// ```rust
/// use nutribot::gemini::mime_type_for;
/// use std::path::Path;
///
/// assert_eq!(mime_type_for(Path::new("meal.JPG")).unwrap(), "image/jpeg");
/// assert!(mime_type_for(Path::new("meal.gif")).is_err());
/// ```
pub fn mime_type_for(path: &Path) -> Result<&'static str, VisionError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        Some("webp") => Ok("image/webp"),
        Some("heic") => Ok("image/heic"),
        Some("heif") => Ok("image/heif"),
        _ => Err(VisionError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Mask an API key for logging: first 4 chars, `***`, last 2 chars
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}***{tail}")
}

/// Calculate retry delay with exponential backoff and up to 10% jitter
pub fn calculate_retry_delay(attempt: u32, config: &RecoveryConfig) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << attempt.min(16));
    let capped = exponential.min(config.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 10);
    Duration::from_millis(capped + jitter)
}

/// Client for the Gemini text and vision models
pub struct VisionClient {
    http: reqwest::Client,
    api_key: String,
    config: GeminiConfig,
    recovery: RecoveryConfig,
    circuit_breaker: CircuitBreaker,
}

impl VisionClient {
    /// Create a client; fails when the API key is empty
    pub fn new(
        api_key: impl Into<String>,
        config: GeminiConfig,
        recovery: RecoveryConfig,
    ) -> Result<Self, VisionError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(VisionError::Configuration(
                "API key not found. Set the GOOGLE_API_KEY environment variable.".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            circuit_breaker: CircuitBreaker::new(recovery.clone()),
            config,
            recovery,
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self, VisionError> {
        Self::new(
            config.google_api_key.clone(),
            config.gemini.clone(),
            config.recovery.clone(),
        )
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Ask the model about `prompt`, optionally with the image at `image_path`
    ///
    /// Without an image the text model is used; with one, the vision model.
    pub async fn response(
        &self,
        image_path: Option<&Path>,
        prompt: &str,
    ) -> Result<String, VisionError> {
        let image = match image_path {
            None => None,
            Some(path) => {
                let mime_type = mime_type_for(path)?;
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    VisionError::ImageRead(format!("{}: {e}", path.display()))
                })?;
                debug!(path = %path.display(), bytes = bytes.len(), mime_type, "Loaded image for vision request");
                Some(InlineImage::from_bytes(mime_type, &bytes))
            }
        };

        self.generate(prompt, image).await
    }

    /// Build the request body for a prompt and optional image
    pub fn build_request(&self, prompt: &str, image: Option<InlineImage>) -> GenerateContentRequest {
        let mut parts = vec![Part::text(prompt)];
        if let Some(image) = image {
            parts.push(Part::image(image));
        }

        GenerateContentRequest {
            contents: vec![Content { parts }],
            safety_settings: vec![SafetySetting {
                category: self.config.safety_category.clone(),
                threshold: self.config.safety_threshold.clone(),
            }],
            generation_config: GenerationConfig {
                stop_sequences: self.config.stop_sequences.clone(),
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
            },
        }
    }

    /// Send a prompt with an optional inline image and return the reply text
    pub async fn generate(
        &self,
        prompt: &str,
        image: Option<InlineImage>,
    ) -> Result<String, VisionError> {
        if self.circuit_breaker.is_open() {
            warn!("Gemini circuit breaker is open, rejecting request");
            return Err(VisionError::CircuitOpen(
                "Gemini API disabled after repeated failures".to_string(),
            ));
        }

        let model = if image.is_some() {
            self.config.vision_model.as_str()
        } else {
            self.config.text_model.as_str()
        };
        let request = self.build_request(prompt, image);

        info!(
            model = %model,
            prompt_chars = prompt.chars().count(),
            api_key = %mask_key(&self.api_key),
            "Gemini generateContent request"
        );

        let mut attempt = 0;
        loop {
            match self.send(model, &request).await {
                Ok(text) => {
                    self.circuit_breaker.record_success();
                    info!(model = %model, reply_chars = text.chars().count(), "Gemini reply received");
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.recovery.max_retries => {
                    let delay = calculate_retry_delay(attempt, &self.recovery);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Gemini request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        self.circuit_breaker.record_failure();
                    }
                    warn!(model = %model, error = %e, "Gemini request failed");
                    return Err(e);
                }
            }
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.config.api_base, model)
    }

    async fn send(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, VisionError> {
        let response = self
            .http
            .post(self.endpoint(model))
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        match parsed.first_text() {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            text => {
                let fallback = if text.is_some() { "empty text" } else { "no candidates" };
                let reason = parsed
                    .candidates
                    .first()
                    .and_then(|candidate| candidate.finish_reason.clone())
                    .unwrap_or_else(|| fallback.to_string());
                Err(VisionError::EmptyResponse(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "***");
        assert_eq!(mask_key("AIzaSyExampleKey42"), "AIza***42");
    }

    #[test]
    fn test_retry_delay_bounds() {
        let config = RecoveryConfig::default();

        let first = calculate_retry_delay(0, &config);
        assert!(first >= Duration::from_millis(1000));
        assert!(first <= Duration::from_millis(1100));

        let third = calculate_retry_delay(2, &config);
        assert!(third >= Duration::from_millis(4000));
        assert!(third <= Duration::from_millis(4400));

        let capped = calculate_retry_delay(30, &config);
        assert!(capped >= Duration::from_millis(10000));
        assert!(capped <= Duration::from_millis(11000));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = VisionClient::new("  ", GeminiConfig::default(), RecoveryConfig::default());
        assert!(matches!(result, Err(VisionError::Configuration(_))));
    }

    #[test]
    fn test_first_text_requires_a_text_part() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_text(), None);
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("SAFETY"));
    }
}
