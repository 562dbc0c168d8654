use reqwest::StatusCode;

use super::CropError;
use crate::content::FieldErrors;

/// 客户端错误
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("access denied")]
    AccessDenied,

    #[error("a submission is already in progress")]
    InFlight,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error(transparent)]
    Crop(#[from] CropError),
}

impl From<FieldErrors> for ClientError {
    fn from(errors: FieldErrors) -> Self {
        ClientError::Validation(errors)
    }
}
