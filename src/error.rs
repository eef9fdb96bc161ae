use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Failure to turn a file on disk into a usable model or scaler.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported artifact format for {0} (expected .onnx or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load ONNX graph {path}: {message}")]
    Onnx { path: PathBuf, message: String },

    #[error("invalid artifact {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Failure while serving a single prediction.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Model not loaded. Please check server logs.")]
    ModelNotLoaded,

    #[error("feature scaling failed: {0}")]
    Scaling(String),

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("model returned no output")]
    EmptyOutput,

    #[error("model returned a non-finite value: {0}")]
    NonFinite(f64),
}

/// Which rule a request field broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Missing,
    IntType,
    FloatType,
    GreaterThanEqual,
    LessThanEqual,
    ObjectType,
    JsonInvalid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub constraint: Constraint,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, constraint: Constraint, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint,
            message: message.into(),
        }
    }
}

/// Every field-level violation found in one request body.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{}", summarize(.detail))]
pub struct ValidationErrors {
    pub detail: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(error: FieldError) -> Self {
        Self {
            detail: vec![error],
        }
    }

    /// Whether any violation names `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.detail.iter().any(|e| e.field == field)
    }
}

fn summarize(detail: &[FieldError]) -> String {
    detail
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that reach the HTTP boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictError),

    #[error("Prediction task failed: {0}")]
    Blocking(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Prediction(_) | ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Validation(errors) => HttpResponse::build(self.status_code()).json(errors),
            _ => HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_display_lists_every_field() {
        let errors = ValidationErrors {
            detail: vec![
                FieldError::new("AGE", Constraint::GreaterThanEqual, "Input should be greater than or equal to 10"),
                FieldError::new("HR_IR", Constraint::Missing, "Field required"),
            ],
        };

        assert_eq!(
            errors.to_string(),
            "AGE: Input should be greater than or equal to 10; HR_IR: Field required"
        );
        assert!(errors.mentions("HR_IR"));
        assert!(!errors.mentions("WEIGHT"));
    }

    #[test]
    fn api_error_status_codes() {
        let validation = ApiError::from(ValidationErrors::single(FieldError::new(
            "body",
            Constraint::JsonInvalid,
            "EOF while parsing",
        )));
        assert_eq!(validation.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let inference = ApiError::from(PredictError::EmptyOutput);
        assert_eq!(inference.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn constraint_serializes_snake_case() {
        let value = serde_json::to_value(Constraint::GreaterThanEqual).unwrap();
        assert_eq!(value, "greater_than_equal");
    }
}
