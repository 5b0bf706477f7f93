use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;

/// One uploaded image: its declared content type and raw bytes.
///
/// Fields are private so a constructed part cannot be altered afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePart {
    mime_type: String,
    data: Vec<u8>,
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// `data:` URI used to show the upload back to the user.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

// Image bytes stay out of logs.
impl fmt::Debug for ImagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePart")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub image: Option<ImagePart>,
}

impl PromptRequest {
    /// Text part sent to the model: system prompt and question, newline-joined.
    pub fn combined_text(&self) -> String {
        format!("{}\n{}", self.system_prompt, self.user_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
}
