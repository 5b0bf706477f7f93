use crate::error::AppError;
use crate::gemini::GeminiGenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str = "
You are an expert in understanding invoices. We will upload an image as invoice
and you will have to answer any questions based on the uploaded invoice image
";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm_params: LLMParams,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMParams {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    // Usually empty in the file; filled from GOOGLE_API_KEY at load time.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub generation_config: Option<GeminiGenerationConfig>,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LLMParams {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            generation_config: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_params: LLMParams::default(),
            system_prompt: default_system_prompt(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Builds the runtime configuration: the optional YAML file, then the API
    /// key from the process environment. A missing key is fatal.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let config = match path {
            Some(p) => Self::from_file(p)
                .map_err(|e| AppError::Configuration(format!("failed to read {}: {}", p, e)))?,
            None => Self::default(),
        };
        config.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    /// Loads `path` into the process environment. A missing file is fine; one
    /// that exists but does not parse is a configuration error.
    pub fn load_env_file(path: &Path) -> Result<bool, AppError> {
        match dotenvy::from_path(path) {
            Ok(()) => Ok(true),
            Err(e) if e.not_found() => Ok(false),
            Err(e) => Err(AppError::Configuration(format!(
                "failed to load {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn resolve_api_key(mut self, from_env: Option<String>) -> Result<Self, AppError> {
        if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
            self.llm_params.api_key = key;
        }
        if self.llm_params.api_key.trim().is_empty() {
            return Err(AppError::Configuration(format!(
                "Please set the {} environment variable",
                API_KEY_ENV
            )));
        }
        Ok(self)
    }
}
