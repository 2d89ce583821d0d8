use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub mod ai;
pub mod config;
pub mod extract;
pub mod models;
pub mod upload;

use ai::{GeminiClient, Summarizer};
use config::Config;

/// Per-process state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<Summarizer>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(summarizer: Summarizer, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            summarizer: Arc::new(summarizer),
            upload_dir: upload_dir.into(),
        }
    }

    /// Build the model client once; a missing key leaves the summarizer
    /// unconfigured so `/upload` still answers with a placeholder.
    pub fn from_config(config: &Config) -> Self {
        let summarizer = match &config.api_key {
            Some(key) => match GeminiClient::with_options(
                key.clone(),
                config.model.clone(),
                config.gemini_base_url.clone(),
                config.request_timeout,
            ) {
                Ok(client) => Summarizer::new(Arc::new(client)),
                Err(e) => {
                    tracing::warn!("could not build Gemini client: {}", e);
                    Summarizer::unconfigured(config.model.clone())
                }
            },
            None => {
                tracing::warn!("{} not set; AI responses will be placeholders", ai::API_KEY_ENV);
                Summarizer::unconfigured(config.model.clone())
            }
        };
        tracing::info!(
            "summarizer using model {} (configured: {})",
            summarizer.model_name(),
            summarizer.is_configured()
        );
        Self::new(summarizer, config.upload_dir.clone())
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(upload::index))
        .route("/health", get(upload::health))
        .route("/upload", post(upload::upload_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
