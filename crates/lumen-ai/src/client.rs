//! Gemini HTTP client.
//!
//! One client serves all three capabilities over `generateContent`: images
//! travel as base64 PNG inline parts, critiques come back as JSON text and
//! go through [`coerce_critique`].

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::RgbImage;
use reqwest::Client;
use tracing::{debug, warn};

use lumen_models::Critique;

use crate::critique::{coerce_critique, critique_schema_json};
use crate::error::{AiError, AiResult};
use crate::service::{ImageCritic, ImageEnhancer, SurgicalEditor};
use crate::types::{Content, GenerateRequest, GenerateResponse, GenerationConfig, InlineData, Part};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_CRITIQUE_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    pub api_key: String,
    /// API root, without trailing slash
    pub base_url: String,
    pub enhance_model: String,
    pub critique_model: String,
    pub edit_model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            enhance_model: DEFAULT_IMAGE_MODEL.to_string(),
            critique_model: DEFAULT_CRITIQUE_MODEL.to_string(),
            edit_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AiClientConfig {
    /// Create config from environment variables. `GEMINI_API_KEY` is required.
    pub fn from_env() -> AiResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AiError::config("GEMINI_API_KEY not set"))?;

        let defaults = Self::default();
        Ok(Self {
            api_key,
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            enhance_model: std::env::var("LUMEN_ENHANCE_MODEL").unwrap_or(defaults.enhance_model),
            critique_model: std::env::var("LUMEN_CRITIQUE_MODEL")
                .unwrap_or(defaults.critique_model),
            edit_model: std::env::var("LUMEN_EDIT_MODEL").unwrap_or(defaults.edit_model),
            timeout: Duration::from_secs(
                std::env::var("LUMEN_AI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        })
    }
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: AiClientConfig,
}

impl GeminiClient {
    pub fn new(config: AiClientConfig) -> AiResult<Self> {
        if config.api_key.is_empty() {
            return Err(AiError::config("API key is empty"));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(AiClientConfig::from_env()?)
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    /// Call `generateContent` on `model`.
    async fn generate(
        &self,
        model: &str,
        parts: Vec<Part>,
        generation_config: GenerationConfig,
    ) -> AiResult<GenerateResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config,
        };

        debug!(model, "Calling generateContent");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            warn!(model, status = status.as_u16(), "Gemini API returned error");
            return Err(AiError::from_status(status.as_u16(), body));
        }

        serde_json::from_str(&body)
            .map_err(|e| AiError::malformed(format!("generateContent body: {}", e)))
    }

    fn classify(&self, error: reqwest::Error) -> AiError {
        if error.is_timeout() {
            AiError::Timeout(self.config.timeout.as_secs())
        } else {
            AiError::Network(error)
        }
    }

    async fn generate_image(
        &self,
        model: &str,
        prompt: String,
        image: &RgbImage,
    ) -> AiResult<RgbImage> {
        let parts = vec![Part::text(prompt), Part::png(encode_png(image)?)];
        let response = self.generate(model, parts, GenerationConfig::image()).await?;

        let data = response.first_image().ok_or_else(|| {
            AiError::malformed(format!("no image in response ({})", response.empty_reason()))
        })?;
        decode_image(data)
    }
}

#[async_trait]
impl ImageEnhancer for GeminiClient {
    async fn enhance(&self, image: &RgbImage, instruction: &str) -> AiResult<RgbImage> {
        self.generate_image(&self.config.enhance_model, enhance_prompt(instruction), image)
            .await
    }
}

#[async_trait]
impl ImageCritic for GeminiClient {
    async fn critique(&self, image: &RgbImage) -> AiResult<Critique> {
        let parts = vec![Part::text(critique_prompt()), Part::png(encode_png(image)?)];
        let response = self
            .generate(&self.config.critique_model, parts, GenerationConfig::json())
            .await?;

        let text = response.text().ok_or_else(|| {
            AiError::malformed(format!("no text in critique ({})", response.empty_reason()))
        })?;
        coerce_critique(&text)
    }
}

#[async_trait]
impl SurgicalEditor for GeminiClient {
    async fn edit(&self, image: &RgbImage, region: &str, instruction: &str) -> AiResult<RgbImage> {
        self.generate_image(
            &self.config.edit_model,
            surgical_prompt(region, instruction),
            image,
        )
        .await
    }
}

fn enhance_prompt(instruction: &str) -> String {
    format!(
        "{instruction}\n\n\
         Constraints:\n\
         - Keep the exact framing, composition and resolution of the input image.\n\
         - Do not add, remove, move or resize any object.\n\
         - Return only the edited image."
    )
}

fn surgical_prompt(region: &str, instruction: &str) -> String {
    format!(
        "{instruction}\n\n\
         Edit ONLY this region of the image: {region}.\n\
         Every pixel outside that region must stay unchanged. \
         Keep the resolution identical and return only the edited image."
    )
}

fn critique_prompt() -> String {
    format!(
        "You are a strict photo editor. Rate how close this image is to a \
         natural, high-end photograph on a 0-10 scale and list every remaining defect.\n\
         Mark a defect \"surgical\" when it is confined to one region \
         (a face, a hand, a sign) and \"global\" when it affects the whole frame \
         (exposure, colour cast, noise).\n\n\
         Return ONLY a JSON object matching this schema:\n{}",
        critique_schema_json()
    )
}

/// Encode as base64 PNG.
pub fn encode_png(image: &RgbImage) -> AiResult<String> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
    Ok(BASE64.encode(bytes))
}

/// Decode an inline image part into RGB8 pixels.
pub fn decode_image(data: &InlineData) -> AiResult<RgbImage> {
    let bytes = BASE64
        .decode(data.data.trim())
        .map_err(|e| AiError::malformed(format!("image payload is not base64: {}", e)))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| AiError::malformed(format!("image payload is not an image: {}", e)))?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_config_defaults() {
        let config = AiClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.critique_model, DEFAULT_CRITIQUE_MODEL);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            GeminiClient::new(AiClientConfig::default()),
            Err(AiError::Config(_))
        ));
    }

    #[test]
    fn test_png_payload_roundtrip() {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 80, 7]));
        let data = InlineData {
            mime_type: "image/png".to_string(),
            data: encode_png(&image).unwrap(),
        };
        assert_eq!(decode_image(&data).unwrap(), image);
    }

    #[test]
    fn test_garbage_payload_is_malformed() {
        let data = InlineData {
            mime_type: "image/png".to_string(),
            data: BASE64.encode(b"definitely not a png"),
        };
        assert!(decode_image(&data).unwrap_err().is_malformed());
    }

    #[test]
    fn test_prompts_carry_context() {
        assert!(surgical_prompt("left eye", "fix it").contains("left eye"));
        assert!(critique_prompt().contains("\"score\""));
        assert!(enhance_prompt("make it cinematic").starts_with("make it cinematic"));
    }
}
