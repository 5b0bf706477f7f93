use crate::config::LLMParams;
use crate::error::AppError;
use crate::gemini::{GeminiPart, GeminiRequest, GeminiResponse};
use crate::models::{ImagePart, ModelResponse, PromptRequest};
use crate::request_id::RequestId;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_IMAGE_RESPONSE: &str = "No image uploaded, cannot process invoice.";

/// The remote generative model, seen as one call.
#[async_trait]
pub trait GenerateContent: Send + Sync {
    async fn generate_content(
        &self,
        request: GeminiRequest,
        request_id: &RequestId,
    ) -> Result<GeminiResponse, AppError>;
}

#[derive(Debug)]
pub struct GeminiClient {
    http_client: Arc<reqwest::Client>,
    params: LLMParams,
}

impl GeminiClient {
    pub fn new(http_client: Arc<reqwest::Client>, params: LLMParams) -> Self {
        Self { http_client, params }
    }

    fn build_target_url(&self) -> String {
        let api_base = &self.params.api_base;
        let path = format!("models/{}:generateContent", self.params.model);
        if api_base.ends_with('/') {
            format!("{}{}", api_base, path)
        } else {
            format!("{}/{}", api_base, path)
        }
    }
}

#[async_trait]
impl GenerateContent for GeminiClient {
    async fn generate_content(
        &self,
        mut request: GeminiRequest,
        request_id: &RequestId,
    ) -> Result<GeminiResponse, AppError> {
        if request.generation_config.is_none() {
            request = request.with_generation_config(self.params.generation_config.clone());
        }

        let target_url = self.build_target_url();
        let mut target_request = self
            .http_client
            .post(&target_url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.params.api_key);

        if let Ok(val) = HeaderValue::from_str(&request_id.0) {
            target_request = target_request.header("x-request-id", val);
        }

        info!("Forwarding request to: {}", target_url);
        let response = target_request.json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!("Model returned {}: {}", status, error_body);
            return Err(AppError::RemoteCall(format!(
                "request failed with status {}: {}",
                status, error_body
            )));
        }

        let body = response.text().await?;
        debug!("response body: {}", body);
        serde_json::from_str(&body)
            .map_err(|e| AppError::RemoteCall(format!("malformed response: {}", e)))
    }
}

/// Turns an invoice question into exactly one model call.
#[derive(Clone)]
pub struct ModelClient {
    model: Arc<dyn GenerateContent>,
}

impl ModelClient {
    pub fn new(model: Arc<dyn GenerateContent>) -> Self {
        Self { model }
    }

    pub async fn get_response(
        &self,
        system_prompt: &str,
        user_text: &str,
        image: Option<&ImagePart>,
        request_id: &RequestId,
    ) -> Result<String, AppError> {
        let prompt = PromptRequest {
            system_prompt: system_prompt.to_string(),
            user_text: user_text.to_string(),
            image: image.cloned(),
        };
        Ok(self.send(&prompt, request_id).await?.text)
    }

    async fn send(
        &self,
        prompt: &PromptRequest,
        request_id: &RequestId,
    ) -> Result<ModelResponse, AppError> {
        let Some(image) = &prompt.image else {
            info!("No image in submission, skipping model call");
            return Ok(ModelResponse {
                text: NO_IMAGE_RESPONSE.to_string(),
            });
        };

        let request = GeminiRequest::single_turn(vec![
            GeminiPart::text(prompt.combined_text()),
            GeminiPart::inline_data(image.mime_type(), image.data()),
        ]);
        let response = self.model.generate_content(request, request_id).await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "token usage ({:?}): prompt={:?} candidates={:?} total={:?}",
                response.model_version,
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count
            );
        }

        match response.text() {
            Some(text) => Ok(ModelResponse { text }),
            None => {
                let reason = match (response.block_reason(), response.candidates.first()) {
                    (Some(block), _) => format!("prompt blocked: {:?}", block),
                    (None, Some(candidate)) => format!(
                        "no text in response (finish reason: {:?})",
                        candidate.finish_reason
                    ),
                    (None, None) => "response contained no candidates".to_string(),
                };
                Err(AppError::RemoteCall(reason))
            }
        }
    }
}
