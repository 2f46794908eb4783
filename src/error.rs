//! Request-level error taxonomy for the report subsystem.
//!
//! Every failure is translated to the `{success: false, error: {...}}`
//! envelope at the request boundary. Internal details (SQL errors, engine
//! stderr) are logged but never sent to the caller.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::Value;
use thiserror::Error;

use crate::db::StoreError;
use crate::pdf::PdfError;
use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    /// The inspection behind the report is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(String),
    #[error("too many requests")]
    RateLimited,
    #[error("rendering engine failure: {0}")]
    Rendering(#[from] PdfError),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Stable machine-readable code for the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "PERMISSION_DENIED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Conflict(_) | Self::InvalidState(_) => "CONFLICT",
            Self::RateLimited => "RATE_LIMIT",
            Self::Rendering(_) => "RENDERING_ENGINE_ERROR",
            Self::Store(_) | Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Rendering(_) => "PDF generation failed, please retry".to_string(),
            Self::Store(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    /// Engine failures are transient; everything else needs a different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rendering(_))
    }
}

impl ResponseError for ReportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Rendering(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        let mut body = ErrorResponse::new(self.code(), &self.public_message());
        if let Self::Validation {
            details: Some(details),
            ..
        } = self
        {
            body.error.details = Some(details.clone());
        }
        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ReportError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ReportError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ReportError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ReportError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ReportError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ReportError::InvalidState("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ReportError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ReportError::Rendering(PdfError::MissingOutput).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = ReportError::Internal("connection refused at 10.0.0.3:5432".into());
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = ReportError::Rendering(PdfError::EngineExit {
            code: 1,
            stderr: "/usr/lib/chromium crashed".into(),
        });
        assert!(!err.public_message().contains("chromium"));
        assert!(err.is_retryable());
    }
}
