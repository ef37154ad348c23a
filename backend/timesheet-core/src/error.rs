// src/error.rs
use axum::http::StatusCode as AxumStatusCode;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::spreadsheet::SheetError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    NotFound(String),

    #[error("An error occurred while processing the file: {0}")]
    ProcessingFailure(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid user ID or password.")]
    InvalidCredentials,

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
}

// Helper to create context-aware IO errors
pub fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> AppError {
    AppError::Io {
        source: source.into(),
        context: context.into(),
    }
}

impl From<SheetError> for AppError {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::Workbook(msg) => AppError::ProcessingFailure(msg),
            other => AppError::InvalidFormat(other.to_string()),
        }
    }
}

impl AppError {
    fn status_code(&self) -> AxumStatusCode {
        match self {
            AppError::InvalidFormat(_) | AppError::AlreadyExists(_) | AppError::BadRequest(_) => {
                AxumStatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => AxumStatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::InvalidCredentials => {
                AxumStatusCode::UNAUTHORIZED
            }
            AppError::ProcessingFailure(_)
            | AppError::Io { .. }
            | AppError::Json(_)
            | AppError::PasswordHash(_)
            | AppError::Config(_)
            | AppError::TlsConfig(_) => AxumStatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller. Storage internals stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Io { .. } => "Internal server error (File I/O). Check logs.".to_string(),
            AppError::Json(_) => "Internal server error (JSON processing).".to_string(),
            AppError::PasswordHash(_) => "Internal server error (Credentials).".to_string(),
            AppError::Config(_) | AppError::TlsConfig(_) => {
                "Server configuration error.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!("Error occurred: {:?}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (
            status_code,
            Json(json!({
                "error": self.public_message(),
                "status": "failure",
            })),
        )
            .into_response()
    }
}
