use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{SummaryResult, SummaryStatus};

// ── Constants ────────────────────────────────────────────────────────────────

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Characters of document text embedded in the analysis prompt.
pub const MAX_PROMPT_CHARS: usize = 5000;

const USER_AGENT: &str = "pdf-vox/0.1";
const API_KEY_HEADER: &str = "x-goog-api-key";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Upstream(String),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

// ── Generator seam ───────────────────────────────────────────────────────────

/// A hosted model that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;

    fn model_name(&self) -> &str;
}

// ── Gemini REST client ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        let base = Url::parse(DEFAULT_BASE_URL).map_err(|e| AiError::Configuration(e.to_string()))?;
        Self::with_options(
            api_key,
            model,
            base,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Url,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let model = model.into();
        let endpoint = model_endpoint(&base_url, &model)?;

        let http = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AiError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            model,
        })
    }

    /// Build a client from an explicit key or `GOOGLE_API_KEY`.
    pub fn from_key(api_key: Option<&str>, model: &str) -> Result<Self, AiError> {
        let key = resolve_api_key(api_key)?;
        Self::new(key, model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Upstream(format!("TimeoutError: {}", e))
                } else if e.is_connect() {
                    AiError::Upstream(format!("ConnectError: {}", e))
                } else {
                    AiError::Upstream(format!("RequestError: {}", e))
                }
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| AiError::Upstream(format!("RequestError: {}", e)))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<ApiErrorBody>(&raw) {
                Ok(body) => match body.error.status {
                    Some(code) => format!("{} {}: {}", status.as_u16(), code, body.error.message),
                    None => format!("{}: {}", status.as_u16(), body.error.message),
                },
                Err(_) => format!("{}: {}", status.as_u16(), raw.trim()),
            };
            return Err(AiError::Upstream(detail));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&raw)
            .map_err(|e| AiError::MalformedResponse(e.to_string()))?;
        response_text(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn model_endpoint(base_url: &Url, model: &str) -> Result<Url, AiError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("v1beta/models/{}:generateContent", model))
        .map_err(|e| AiError::Configuration(format!("invalid model endpoint: {}", e)))
}

fn response_text(response: GenerateContentResponse) -> Result<String, AiError> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(AiError::MalformedResponse(match block_reason {
            Some(reason) => format!("prompt blocked: {}", reason),
            None => "no candidates returned".to_string(),
        }));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(AiError::MalformedResponse(format!(
            "candidate has no text (finish reason: {})",
            reason
        )));
    }
    Ok(text)
}

/// Explicit key wins, even when empty; otherwise the environment.
pub fn resolve_api_key(explicit: Option<&str>) -> Result<String, AiError> {
    resolve_api_key_with(explicit, |name| std::env::var(name).ok())
}

/// [`resolve_api_key`] with the variable source supplied by the caller.
pub fn resolve_api_key_with<F>(explicit: Option<&str>, lookup: F) -> Result<String, AiError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = match explicit {
        Some(key) => Some(key.to_string()),
        None => lookup(API_KEY_ENV),
    };
    match key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(missing_key()),
    }
}

fn missing_key() -> AiError {
    AiError::Configuration(format!(
        "Google API key not provided. Set {} environment variable or pass api_key parameter.",
        API_KEY_ENV
    ))
}

// ── Prompts ──────────────────────────────────────────────────────────────────

pub fn analysis_prompt(text: &str) -> String {
    format!(
        "Please analyze the following PDF content and provide a summary:\n\n{}\n\nProvide a concise summary of the main points.",
        truncate_chars(text, MAX_PROMPT_CHARS)
    )
}

pub fn bullet_summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following document in 3-5 bullet points:\n\n{}",
        text
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

// ── Summarizer ───────────────────────────────────────────────────────────────

/// Summarization front end shared by the upload handler.
///
/// Without a generator every call fails with the missing-key configuration
/// error, so the service still starts when no key is set.
pub struct Summarizer {
    generator: Option<Arc<dyn TextGenerator>>,
    model: String,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        let model = generator.model_name().to_string();
        Self {
            generator: Some(generator),
            model,
        }
    }

    /// A summarizer with no key; every call fails with a configuration error.
    pub fn unconfigured(model: impl Into<String>) -> Self {
        Self {
            generator: None,
            model: model.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    fn generator(&self) -> Result<&dyn TextGenerator, AiError> {
        self.generator.as_deref().ok_or_else(missing_key)
    }

    /// Analysis of the first [`MAX_PROMPT_CHARS`] characters of `text`.
    pub async fn analyze(&self, text: &str) -> Result<String, AiError> {
        self.generator()?.generate(&analysis_prompt(text)).await
    }

    /// Bullet-point summary of the whole of `text`.
    pub async fn summarize(&self, text: &str) -> Result<String, AiError> {
        self.generator()?.generate(&bullet_summary_prompt(text)).await
    }

    /// Always returns text: the model output, or a placeholder naming the model.
    pub async fn process_with_ai(&self, text: &str) -> String {
        match self.analyze(text).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("AI processing with {} failed: {}", self.model, e);
                placeholder(&self.model, &e)
            }
        }
    }

    pub async fn generate_summary(&self, text: &str) -> SummaryResult {
        self.summarize(text).await.into()
    }
}

impl From<Result<String, AiError>> for SummaryResult {
    fn from(result: Result<String, AiError>) -> Self {
        match result {
            Ok(summary) => SummaryResult {
                summary,
                status: SummaryStatus::Success,
            },
            Err(e) => SummaryResult {
                summary: format!("AI summary unavailable: {}", e),
                status: SummaryStatus::Error,
            },
        }
    }
}

fn placeholder(model: &str, error: &AiError) -> String {
    format!(
        "[AI Processing Placeholder] Would process text with {}. Error: {}",
        model, error
    )
}

// ── One-shot entry points ────────────────────────────────────────────────────

/// Analyze `text` with `model_name`, using `api_key` or `GOOGLE_API_KEY`.
pub async fn process_with_ai(text: &str, model_name: &str, api_key: Option<&str>) -> String {
    match GeminiClient::from_key(api_key, model_name) {
        Ok(client) => Summarizer::new(Arc::new(client)).process_with_ai(text).await,
        Err(e) => placeholder(model_name, &e),
    }
}

/// Bullet-point summary with the default model.
pub async fn generate_summary(text: &str, api_key: Option<&str>) -> SummaryResult {
    match GeminiClient::from_key(api_key, DEFAULT_MODEL) {
        Ok(client) => Summarizer::new(Arc::new(client)).generate_summary(text).await,
        Err(e) => SummaryResult::from(Err::<String, AiError>(e)),
    }
}
