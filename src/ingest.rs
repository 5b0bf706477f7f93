use crate::error::AppError;
use crate::models::ImagePart;
use bytes::Bytes;
use tracing::debug;

/// Extensions offered by the file picker.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const OCTET_STREAM: &str = "application/octet-stream";

/// A file as handed over by the form layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Browsers submit an empty, nameless part when no file was picked.
    pub fn is_empty_selection(&self) -> bool {
        self.bytes.is_empty() && self.file_name.as_deref().is_none_or(str::is_empty)
    }
}

pub fn ingest_image(file: Option<&UploadedFile>) -> Result<ImagePart, AppError> {
    let file = file
        .filter(|f| !f.is_empty_selection())
        .ok_or_else(|| AppError::MissingInput("No file uploaded".to_string()))?;

    let mime_type = declared_mime_type(file);
    debug!(
        "Ingested upload {:?}: {} bytes, {}",
        file.file_name,
        file.bytes.len(),
        mime_type
    );
    Ok(ImagePart::new(mime_type, file.bytes.to_vec()))
}

fn declared_mime_type(file: &UploadedFile) -> String {
    match file.content_type.as_deref().map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => file
            .file_name
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string()),
    }
}
