//! Remote translation backend port.
//!
//! One request carries a JSON-encoded array of source strings plus a
//! natural-language instruction naming the target language and demanding a
//! same-length, same-order JSON array back. The response envelope follows
//! the OpenAI responses API: the payload is the first candidate's first
//! content item's text; anything else is a protocol error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::constants;
use crate::error::{PipelineError, PipelineResult};
use crate::store::ConfigStore;

/// Wire request for one batch submission.
#[derive(Debug, Clone, Serialize)]
pub struct BackendRequest {
    pub model: String,
    pub instructions: String,
    /// JSON-encoded array of source strings.
    pub input: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default)]
    pub text: String,
}

impl ResponseEnvelope {
    /// Builds the envelope a well-behaved backend would return for the
    /// given translations. Test and demo helper.
    pub fn from_translations(translations: &[&str]) -> Self {
        let text = serde_json::to_string(translations).unwrap_or_default();
        Self {
            output: vec![OutputItem {
                content: vec![ContentItem { text }],
            }],
        }
    }

    /// The payload text, when the envelope has the expected shape.
    pub fn payload_text(&self) -> Option<&str> {
        Some(self.output.first()?.content.first()?.text.as_str())
    }
}

/// Instruction directive sent with every request. Embeds the target
/// language and the strict array-cardinality requirements.
pub fn build_instructions(target_language: &str) -> String {
    format!(
        "You are a professional translator. Translate each item in the \
         following JSON array into natural {target_language}. Return the \
         result as a JSON array with exactly the same number of items, in \
         the same order. Never merge, split or reorder items. Do not \
         include any explanations or formatting."
    )
}

/// Request/response RPC turning a batch of source strings into a backend
/// envelope. Single-threaded pipeline; implementations need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait TranslationBackend {
    async fn translate(&self, request: BackendRequest) -> PipelineResult<ResponseEnvelope>;
}

/// HTTP backend posting to an OpenAI-style `/v1/responses` endpoint with a
/// bearer token read from the configuration store on every call, so a
/// credential rotated by the settings surface takes effect immediately.
pub struct HttpBackend<S: ConfigStore> {
    client: reqwest::Client,
    api_url: String,
    store: S,
}

impl<S: ConfigStore> HttpBackend<S> {
    pub fn new(api_url: impl Into<String>, store: S) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            store,
        }
    }

    async fn api_token(&self) -> PipelineResult<String> {
        let values = self.store.get(&[constants::keys::API_TOKEN]).await?;
        values
            .get(constants::keys::API_TOKEN)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Backend("no API token configured".to_string()))
    }
}

impl<S: ConfigStore> TranslationBackend for HttpBackend<S> {
    async fn translate(&self, request: BackendRequest) -> PipelineResult<ResponseEnvelope> {
        let token = self.api_token().await?;
        debug!(model = %request.model, "submitting translation request");
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        response
            .json::<ResponseEnvelope>()
            .await
            .map_err(|err| PipelineError::Shape(err.to_string()))
    }
}
