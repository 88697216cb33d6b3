use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TtsError>;

/// Request failures, each mapped to an HTTP status.
#[derive(Debug, Error)]
pub enum TtsError {
    /// Language code not present in the profile table
    #[error("Unsupported language: '{0}'")]
    UnsupportedLanguage(String),

    /// Missing, empty or malformed request input
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The speech model failed or produced no audio
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// The external encoder failed, timed out or produced no output
    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    /// Anything else (temp files, worker threads)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl TtsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedLanguage(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Synthesis(_) | Self::Encoding(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::Validation(_) => "validation_error",
            Self::Synthesis(_) => "synthesis_error",
            Self::Encoding(_) => "encoding_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: &'static str,
    code: u16,
}

impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetails {
                message: self.to_string(),
                r#type: self.error_type(),
                code: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}
