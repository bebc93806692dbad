use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{}", .0.message)]
    Api(ApiError),
    #[error("{0}")]
    Precondition(String),
    #[error("signature error: {0}")]
    Signature(String),
    #[error("event stream error: {0}")]
    Stream(String),
}

impl ClientError {
    pub fn api_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(err) => Some(err.code),
            _ => None,
        }
    }

    /// True when the server could not resolve a catalog template for the review.
    pub fn is_template_not_found(&self) -> bool {
        self.api_code() == Some(ErrorCode::TemplateNotFound)
    }
}

impl From<ApiError> for ClientError {
    fn from(value: ApiError) -> Self {
        ClientError::Api(value)
    }
}
