use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::users::repo::RepoError;

/// One failed input check, reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("username already exists")]
    DuplicateUsername,

    /// Unknown user and wrong password are deliberately the same error.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateUsername => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::AlreadyExists => Self::DuplicateUsername,
            RepoError::NotFound => Self::NotFound("User".into()),
            RepoError::TechnicalError(e) => Self::Internal(e.into()),
        }
    }
}

/// Detail of a 500, attached to the response so the app layer can reveal it
/// in development mode.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

pub const INTERNAL_ERROR_BODY: &str = "Something went wrong!";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Body of every 500 response.
pub fn internal_error_body(message: &str) -> serde_json::Value {
    json!({ "error": INTERNAL_ERROR_BODY, "message": message })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({ "errors": errors }),
            Self::MissingParameter(param) => json!({
                "error": self.to_string(),
                "errors": [FieldError::new(param.clone(), format!("{param} is required"))],
            }),
            Self::DuplicateUsername => json!({ "error": "Username already exists" }),
            Self::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            Self::NotFound(what) => json!({ "error": format!("{what} not found") }),
            Self::Internal(e) => {
                error!(error = ?e, "internal error");
                let mut res =
                    (status, Json(internal_error_body(INTERNAL_ERROR_MESSAGE))).into_response();
                res.extensions_mut().insert(ErrorDetail(format!("{e:#}")));
                return res;
            }
        };
        (status, Json(body)).into_response()
    }
}
