//! Gemini REST clients for embeddings and text generation.

use crate::embeddings::Embedder;
use crate::error::{LlmError, SearchError};
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl GeminiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn api_root(&self) -> Result<String, url::ParseError> {
        let parsed = Url::parse(&self.base_url)?;
        Ok(parsed.as_str().trim_end_matches('/').to_string())
    }
}

/// Gemini addresses models as `models/<name>`; accept either form.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'static str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    #[serde(rename = "taskType")]
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn error_message(body: &str) -> (String, Option<String>) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            (envelope.error.message, envelope.error.status)
        }
        Ok(envelope) => (body.to_string(), envelope.error.status),
        Err(_) => (body.to_string(), None),
    }
}

pub struct GeminiEmbedder {
    client: Client,
    api_root: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(config: &GeminiConfig, model: &str) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            api_root: config.api_root()?,
            api_key: config.api_key.clone(),
            model: model_path(model),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &T,
    ) -> Result<reqwest::Response, SearchError> {
        let url = format!("{}/v1beta/{}:{}", self.api_root, self.model, method);
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, _) = error_message(&body);
            return Err(SearchError::Embedding(format!(
                "{} returned {status}: {message}",
                self.model
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH_SIZE) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedContentRequest {
                        model: &self.model,
                        content: Content::text(None, text),
                        task_type: "RETRIEVAL_DOCUMENT",
                    })
                    .collect(),
            };

            let response: BatchEmbedResponse =
                self.post("batchEmbedContents", &request).await?.json().await?;

            if response.embeddings.len() != batch.len() {
                return Err(SearchError::Embedding(format!(
                    "requested {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            debug!(batch_size = batch.len(), model = %self.model, "embedded batch");
            vectors.extend(response.embeddings.into_iter().map(|item| item.values));
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let request = EmbedContentRequest {
            model: &self.model,
            content: Content::text(None, text),
            task_type: "RETRIEVAL_QUERY",
        };

        let response: EmbedContentResponse =
            self.post("embedContent", &request).await?.json().await?;
        Ok(response.embedding.values)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiChatModel {
    client: Client,
    api_root: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiChatModel {
    pub fn new(config: &GeminiConfig, model: &str, temperature: f32) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            api_root: config.api_root()?,
            api_key: config.api_key.clone(),
            model: model.trim_start_matches("models/").to_string(),
            temperature,
        })
    }

    fn failed(&self, message: impl Into<String>) -> LlmError {
        LlmError::Failed {
            model: self.model.clone(),
            message: message.into(),
        }
    }
}

/// Classify an unsuccessful Gemini response.
///
/// HTTP 429 and an error body whose `status` is `RESOURCE_EXHAUSTED` are both
/// quota signals.
pub fn classify_response(model: &str, status: StatusCode, body: &str) -> LlmError {
    let (message, api_status) = error_message(body);
    let message = format!("{status}: {message}");

    if status == StatusCode::TOO_MANY_REQUESTS || api_status.as_deref() == Some("RESOURCE_EXHAUSTED")
    {
        LlmError::RateLimited {
            model: model.to_string(),
            message,
        }
    } else {
        LlmError::Failed {
            model: model.to_string(),
            message,
        }
    }
}

/// Heuristic for failures that carry no HTTP status, such as errors surfaced
/// by a proxy or a transport layer. It matches on message text and can
/// misclassify; responses with a status go through [`classify_response`].
pub fn looks_rate_limited(message: &str) -> bool {
    message.contains("RESOURCE_EXHAUSTED") || message.contains("429")
}

fn classify_transport(model: &str, error: &reqwest::Error) -> LlmError {
    let message = error.to_string();
    if error.status() == Some(StatusCode::TOO_MANY_REQUESTS) || looks_rate_limited(&message) {
        LlmError::RateLimited {
            model: model.to_string(),
            message,
        }
    } else {
        LlmError::Failed {
            model: model.to_string(),
            message,
        }
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_root, self.model
        );
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| classify_transport(&self.model, &error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = classify_response(&self.model, status, &body);
            warn!(model = %self.model, %status, "generation request rejected");
            return Err(error);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|error| self.failed(format!("unreadable response: {error}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| self.failed("response contained no text"))?;

        Ok(text)
    }
}
