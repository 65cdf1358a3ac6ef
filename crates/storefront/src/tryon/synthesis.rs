//! Image-synthesis boundary.
//!
//! One request per attempt carries the shopper's photo, an instruction and
//! the garment photo. The reply's first inline image is the result. Nothing
//! here retries; a failed attempt is retried only when the shopper asks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use luxe_core::Product;
use moka::future::Cache;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use super::image::{ImagePayload, ImageSource};
use crate::config::TryOnConfig;

/// Generative Language API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default image model.
pub const DEFAULT_TRYON_MODEL: &str = "gemini-2.5-flash-image";

const API_KEY_HEADER: &str = "x-goog-api-key";

const IMAGE_CACHE_CAPACITY: u64 = 64;
const IMAGE_CACHE_TTL: Duration = Duration::from_secs(600);

/// Errors from the synthesis boundary.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Reply carried no image part.
    #[error("response contained no image")]
    NoImage,

    /// A remote reference image could not be downloaded.
    #[error("failed to fetch image {url}: {message}")]
    ImageFetch { url: String, message: String },

    /// Failed to build the client or parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Everything one synthesis attempt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub user_image: ImageSource,
    pub garment_image: ImageSource,
    pub instruction: String,
}

/// Boundary to an image-synthesis service.
pub trait ImageSynthesizer {
    /// Produce one image from `request`.
    fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> impl Future<Output = Result<ImagePayload, SynthesisError>> + Send;
}

/// Natural-language instruction for dressing the shopper in `product`.
#[must_use]
pub fn build_instruction(product: &Product) -> String {
    let mut instruction = format!(
        "Dress the person in the first image in the {} ({}) shown in the second image. \
         Keep their face, body shape, pose and background exactly as they are. \
         Match the garment's fabric, colour and cut, with a natural drape and \
         lighting consistent with the original photo.",
        product.name,
        product.category.label().to_lowercase()
    );
    if !product.details.is_empty() {
        instruction.push_str(" Garment details: ");
        instruction.push_str(&product.details.join("; "));
        instruction.push('.');
    }
    instruction.push_str(" Return a single photorealistic image.");
    instruction
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Image {
        #[serde(rename = "inlineData")]
        inline_data: &'a ImagePayload,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ImagePayload>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GenerateResponse {
    fn into_first_image(self) -> Option<ImagePayload> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
    }
}

/// Gemini image-generation client.
///
/// Remote reference images are downloaded once and kept for ten minutes.
#[derive(Clone)]
pub struct GeminiSynthesizer {
    inner: Arc<GeminiInner>,
}

struct GeminiInner {
    client: reqwest::Client,
    /// Sent on API calls only, never on reference-image downloads.
    api_key: HeaderValue,
    api_base: String,
    model: String,
    images: Cache<String, ImagePayload>,
}

impl std::fmt::Debug for GeminiSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSynthesizer")
            .field("api_base", &self.inner.api_base)
            .field("model", &self.inner.model)
            .finish_non_exhaustive()
    }
}

impl GeminiSynthesizer {
    /// Create a client for `model`.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(api_key: &SecretString, model: &str) -> Result<Self, SynthesisError> {
        Self::with_api_base(api_key, model, GEMINI_API_BASE)
    }

    /// Create a client from the try-on configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn from_config(config: &TryOnConfig) -> Result<Self, SynthesisError> {
        Self::new(&config.api_key, &config.model)
    }

    /// Create a client against a custom API base (used by tests).
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn with_api_base(
        api_key: &SecretString,
        model: &str,
        api_base: &str,
    ) -> Result<Self, SynthesisError> {
        let mut key = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|e| SynthesisError::Parse(format!("Invalid API key format: {e}")))?;
        key.set_sensitive(true);

        let client = reqwest::Client::builder().build()?;

        let images = Cache::builder()
            .max_capacity(IMAGE_CACHE_CAPACITY)
            .time_to_live(IMAGE_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(GeminiInner {
                client,
                api_key: key,
                api_base: api_base.trim_end_matches('/').to_string(),
                model: model.to_string(),
                images,
            }),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Inline bytes for `source`, downloading remote images.
    async fn resolve(&self, source: &ImageSource) -> Result<ImagePayload, SynthesisError> {
        match source {
            ImageSource::Inline(payload) => Ok(payload.clone()),
            ImageSource::Remote(url) => self
                .inner
                .images
                .try_get_with(url.clone(), self.fetch(url))
                .await
                .map_err(|e| SynthesisError::ImageFetch {
                    url: url.clone(),
                    message: e.to_string(),
                }),
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<ImagePayload, SynthesisError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message: format!("image download failed for {url}"),
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), mime_type, "Fetched reference image");

        ImagePayload::from_bytes(&mime_type, &bytes)
            .map_err(|e| SynthesisError::Parse(e.to_string()))
    }
}

impl ImageSynthesizer for GeminiSynthesizer {
    #[instrument(skip(self, request), fields(model = %self.inner.model))]
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<ImagePayload, SynthesisError> {
        let user_image = self.resolve(&request.user_image).await?;
        let garment_image = self.resolve(&request.garment_image).await?;

        let body = GenerateRequest {
            contents: [Content {
                parts: vec![
                    RequestPart::Image {
                        inline_data: &user_image,
                    },
                    RequestPart::Text {
                        text: &request.instruction,
                    },
                    RequestPart::Image {
                        inline_data: &garment_image,
                    },
                ],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.inner.api_base, self.inner.model
        );
        let response = self
            .inner
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.inner.api_key.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Parse(e.to_string()))?;
        reply.into_first_image().ok_or(SynthesisError::NoImage)
    }
}
