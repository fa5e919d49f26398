//! Mapping of domain errors onto HTTP responses.

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, ResponseError};
use geoinfo_database::StoreError;
use geoinfo_incident::WorkflowError;
use geoinfo_rate_limit::RateLimitError;
use geoinfo_server_models::ApiErrorBody;

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A workflow operation failed.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A read query failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Request input is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// No caller identity, or an unknown one.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller's role may not use this endpoint.
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    /// Machine-readable category, sent as `kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Workflow(WorkflowError::NotFound { .. }) => "NOT_FOUND",
            Self::Workflow(WorkflowError::InvalidTransition { .. }) => "INVALID_TRANSITION",
            Self::Workflow(WorkflowError::Conflict { .. }) => "CONFLICT",
            Self::Workflow(WorkflowError::Validation(_)) | Self::BadRequest(_) => "VALIDATION",
            Self::Workflow(WorkflowError::RateLimited(_)) => "RATE_LIMITED",
            Self::Workflow(WorkflowError::Store(_)) | Self::Store(_) => "INTERNAL",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Workflow(WorkflowError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Workflow(
                WorkflowError::InvalidTransition { .. } | WorkflowError::Conflict { .. },
            ) => StatusCode::CONFLICT,
            Self::Workflow(WorkflowError::Validation(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Workflow(WorkflowError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Workflow(WorkflowError::Store(_)) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = HttpResponse::build(status);
        if let Self::Workflow(WorkflowError::RateLimited(RateLimitError::Limited { retry_after })) =
            self
        {
            response.insert_header((header::RETRY_AFTER, retry_after.as_secs().max(1).to_string()));
        }

        response.json(ApiErrorBody {
            error: message,
            kind: self.kind().to_string(),
        })
    }
}
