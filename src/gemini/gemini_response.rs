use crate::gemini::{
    GeminiBlockReason, GeminiCandidate, GeminiPart, GeminiPromptFeedback, GeminiUsage,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<GeminiUsage>,
    #[serde(rename = "modelVersion")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(rename = "promptFeedback")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

impl GeminiResponse {
    /// Text of the first candidate, parts concatenated in order. Thought
    /// parts are skipped. `None` when the first candidate carries no text.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                GeminiPart::Text { text, thought } if *thought != Some(true) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    pub fn block_reason(&self) -> Option<&GeminiBlockReason> {
        self.prompt_feedback.as_ref()?.block_reason.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiFinishReason;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_joins_parts_of_first_candidate() {
        let response = parse(json!({
            "candidates": [
                {
                    "content": {"role": "model", "parts": [
                        {"text": "thinking...", "thought": true},
                        {"text": "The total is "},
                        {"text": "$42.00"}
                    ]},
                    "finishReason": "STOP",
                    "index": 0
                },
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {
                "promptTokenCount": 270,
                "candidatesTokenCount": 6,
                "totalTokenCount": 276
            },
            "modelVersion": "gemini-1.5-flash"
        }));

        assert_eq!(response.text().as_deref(), Some("The total is $42.00"));
        assert_eq!(response.candidates[0].finish_reason, Some(GeminiFinishReason::Stop));
        assert_eq!(response.usage_metadata.unwrap().total_token_count, Some(276));
    }

    #[test]
    fn test_text_preserves_whitespace_verbatim() {
        let response = parse(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "\n  Invoice #7 \n"}]}}]
        }));
        assert_eq!(response.text().as_deref(), Some("\n  Invoice #7 \n"));
    }

    #[test]
    fn test_blocked_prompt_has_no_text() {
        let response = parse(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        assert!(response.text().is_none());
        assert_eq!(response.block_reason(), Some(&GeminiBlockReason::Safety));
    }

    #[test]
    fn test_unknown_parts_and_reasons_still_decode() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"executableCode": {"language": "PYTHON", "code": "print(1)"}},
                    {"text": "1"}
                ]},
                "finishReason": "SOMETHING_NEW"
            }]
        }));
        assert_eq!(response.text().as_deref(), Some("1"));
        assert_eq!(
            response.candidates[0].finish_reason,
            Some(GeminiFinishReason::Unrecognized)
        );
    }

    #[test]
    fn test_candidate_without_content() {
        let response = parse(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }));
        assert!(response.text().is_none());
    }
}
