pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{
    ai_service::{AIService, GeminiBackend, GenerativeBackend},
    extractor_service::ExtractorService,
    generation_service::GenerationService,
    prompt_service::PromptService,
    workspace_service::WorkspaceStore,
};
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub workspaces: WorkspaceStore,
    pub generation_service: GenerationService,
    pub max_upload_bytes: usize,
    pub cors_origin: Option<String>,
}

impl AppState {
    pub fn new() -> Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let backend = GeminiBackend::new(
            http_client,
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
        );
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: &Config, backend: Arc<dyn GenerativeBackend>) -> Self {
        let prompts = PromptService::new(
            config.content_limit,
            config.content_sampling,
            config.explanation_language.clone(),
            config.generation_temperature,
        );
        let workspaces = WorkspaceStore::new();
        let generation_service = GenerationService::new(
            AIService::new(backend, prompts),
            ExtractorService::new(config.max_document_pages),
            workspaces.clone(),
        );

        Self {
            workspaces,
            generation_service,
            max_upload_bytes: config.max_upload_bytes,
            cors_origin: config.cors_origin.clone(),
        }
    }
}
