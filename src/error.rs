use std::io;
use std::path::PathBuf;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("Pin number isn't valid: {0}")]
    InvalidPin(String),
    #[error("Direction must be 'input' or 'output', got: {0}")]
    InvalidDirection(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Failed to export line {line}: {stderr}")]
    ExportFailed { line: u32, stderr: String },
    #[error("Failed to unexport line {line}: {stderr}")]
    UnexportFailed { line: u32, stderr: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cleanup failed for {} pin(s): {}", .0.len(), join_errors(.0))]
    Cleanup(Vec<GpioError>),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GpioError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        GpioError::Io {
            path: path.into(),
            source,
        }
    }
}

fn join_errors(errors: &[GpioError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResponseError for GpioError {
    fn status_code(&self) -> StatusCode {
        match self {
            GpioError::InvalidPin(_) => StatusCode::NOT_FOUND,
            GpioError::InvalidDirection(_) | GpioError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            GpioError::ExportFailed { .. } | GpioError::UnexportFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            GpioError::Io { .. } | GpioError::Cleanup(_) | GpioError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
