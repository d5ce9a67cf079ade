use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdf_rag_core::{GenerationError, IngestError, SearchError};
use serde::Serialize;
use tracing::{error, warn};

/// Every failure the HTTP layer reports, already bucketed by status code.
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    Unprocessable(String),
    Upstream(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidInput(detail) | Self::Unprocessable(detail) | Self::Upstream(detail) => {
                detail
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), detail = %self.detail(), "request failed");
        } else {
            warn!(status = status.as_u16(), detail = %self.detail(), "request rejected");
        }

        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidFileType(_) => {
                Self::InvalidInput("Only PDF files are supported.".to_string())
            }
            IngestError::NoExtractableText(_) => Self::Unprocessable(
                "PDF contains no extractable text (may be scanned/image-based).".to_string(),
            ),
            IngestError::Store(err) => err.into(),
            other => Self::Upstream(format!("Failed to process PDF: {other}")),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self::Upstream(format!("Vector store error: {err}"))
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        Self::Upstream(format!("Error generating answer: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::InvalidInput(err.body_text())
    }
}
