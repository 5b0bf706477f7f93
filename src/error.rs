use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Required setting missing or unreadable at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    MissingInput(String),

    #[error("invalid form submission: {0}")]
    InvalidForm(String),

    /// Anything that went wrong talking to the remote model.
    #[error("model request failed: {0}")]
    RemoteCall(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::RemoteCall(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::InvalidForm(err.body_text())
    }
}
