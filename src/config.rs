use crate::error::{Error, Result};
use crate::services::prompt_service::SamplingPolicy;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub generation_temperature: f32,
    pub content_limit: usize,
    pub content_sampling: SamplingPolicy,
    pub max_document_pages: Option<usize>,
    pub max_upload_bytes: usize,
    pub explanation_language: String,
    pub cors_origin: Option<String>,
    pub workspace_idle_ttl_secs: u64,
    pub workspace_sweep_interval_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "127.0.0.1:8080"),
            gemini_api_key: get_env("GEMINI_API_KEY")?,
            gemini_model: get_env_or("GEMINI_MODEL", "gemini-3-flash-preview"),
            gemini_base_url: get_env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            generation_temperature: get_env_parse_or("GENERATION_TEMPERATURE", 0.9)?,
            content_limit: get_env_parse_or("CONTENT_LIMIT", 250_000)?,
            content_sampling: get_env_parse_or("CONTENT_SAMPLING", SamplingPolicy::Truncate)?,
            max_document_pages: get_env_parse_opt("MAX_DOCUMENT_PAGES")?,
            max_upload_bytes: get_env_parse_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            explanation_language: get_env_or("EXPLANATION_LANGUAGE", "Vietnamese"),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.trim().is_empty()),
            workspace_idle_ttl_secs: get_env_parse_or("WORKSPACE_IDLE_TTL_SECS", 3600)?,
            workspace_sweep_interval_secs: get_env_parse_or("WORKSPACE_SWEEP_INTERVAL_SECS", 60)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_opt<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse_opt(name)?.unwrap_or(default))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
