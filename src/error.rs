use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Please choose a valid PDF file.")]
    InvalidFileType,

    #[error("Could not extract enough text from the document. Try entering a prompt instead.")]
    InsufficientText,

    #[error("The file could not be read: {0}")]
    FileReadFailure(String),

    #[error("The prompt is too short. Describe a more specific topic.")]
    PromptTooShort,

    #[error("Could not generate the quiz. Please try again.")]
    GenerationFailed,

    #[error("A quiz is already being prepared for this workspace")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl Error {
    /// True for the failures a user can recover from by changing their input.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidFileType
                | Error::InsufficientText
                | Error::FileReadFailure(_)
                | Error::PromptTooShort
                | Error::GenerationFailed
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Error::InvalidFileType => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InsufficientText => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::FileReadFailure(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::PromptTooShort => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::GenerationFailed => (StatusCode::BAD_GATEWAY, self.to_string()),
            Error::Busy => (StatusCode::CONFLICT, self.to_string()),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Reqwest(err) => (StatusCode::BAD_GATEWAY, format!("External service error: {}", err)),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Multipart(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
