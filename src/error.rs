use std::io;

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::content::{ArticleStatus, FieldErrors, StatusAction};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("access denied")]
    AccessDenied,

    #[error("Not Found")]
    NotFound,

    #[error("cannot {action} an article that is {from}")]
    InvalidTransition {
        from: ArticleStatus,
        action: StatusAction,
    },

    #[error("{0}")]
    FormatError(&'static str),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<FieldErrors> for Error {
    fn from(errors: FieldErrors) -> Self {
        Error::Validation(errors)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "message": errors.first_message().unwrap_or("The given data was invalid."),
                    "errors": errors,
                })),
            )
                .into_response(),
            Error::AccessDenied => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            Error::NotFound => (StatusCode::NOT_FOUND, "NOT FOUND").into_response(),
            e @ Error::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, e.to_string()).into_response()
            }
            Error::FormatError(s) => (StatusCode::BAD_REQUEST, s.to_string()).into_response(),
            Error::Multipart(e) => (e.status(), e.body_text()).into_response(),
            Error::Sqlx(e) => {
                tracing::error!(%e, "sqlx error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
            Error::Io(e) => {
                tracing::error!(%e, "file io error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
        }
    }
}
