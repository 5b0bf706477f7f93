use crate::gemini::{GeminiContent, GeminiGenerationConfig, GeminiPart};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

impl GeminiRequest {
    /// A single-turn request: one user content carrying `parts` in order.
    pub fn single_turn(parts: Vec<GeminiPart>) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: None,
        }
    }

    pub fn with_generation_config(mut self, config: Option<GeminiGenerationConfig>) -> Self {
        self.generation_config = config;
        self
    }
}
