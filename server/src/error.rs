use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::derive::Display;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;
pub type AppJsonResult<T> = AppResult<Json<T>>;

pub type ReportResult<T> = Result<T, ReportError>;

/// Failure of a single call to a text-generation backend
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[display("backend unavailable: {_0}")]
    Unavailable(String),
    #[display("backend timed out")]
    Timeout,
    #[display("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[display("backend returned no text")]
    EmptyResponse,
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// Classify a non-success HTTP status returned by a backend
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::UNPROCESSABLE_ENTITY
            | StatusCode::TOO_MANY_REQUESTS => BackendError::Rejected {
                status: status.as_u16(),
                message: body,
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout,
            s if s.is_client_error() => BackendError::Rejected {
                status: s.as_u16(),
                message: body,
            },
            s => BackendError::Unavailable(format!("status {}: {}", s, body)),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return BackendError::Timeout;
        }
        match error.status() {
            Some(status) => BackendError::from_status(status, error.to_string()),
            None => BackendError::Unavailable(error.to_string()),
        }
    }
}

/// Which generation pass failed
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    #[display("structured insight extraction")]
    Extraction,
    #[display("executive report synthesis")]
    Synthesis,
}

/// Errors surfaced by a report run. Classification never fails, so every
/// variant belongs to an external call.
#[derive(Debug, Display)]
pub enum ReportError {
    #[display("data unavailable: {_0}")]
    DataUnavailable(String),
    #[display("{stage} failed: {source}")]
    GenerationBackend {
        stage: GenerationStage,
        source: BackendError,
    },
    #[display("send failed: {_0}")]
    SendFailed(String),
}

impl std::error::Error for ReportError {}

impl ReportError {
    pub fn generation(stage: GenerationStage, source: BackendError) -> Self {
        ReportError::GenerationBackend { stage, source }
    }
}

/// Structured extraction output could not be read. Recovered locally.
#[derive(Debug, Display)]
#[display("structured insight output rejected: {_0}")]
pub struct ParseDegraded(pub String);

impl std::error::Error for ParseDegraded {}

#[derive(Debug, Display)]
pub enum AppError {
    BadRequest(String),
    Internal(anyhow::Error),
    RequestTimeout,
    Report(ReportError),
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<ReportError> for AppError {
    fn from(error: ReportError) -> Self {
        AppError::Report(error)
    }
}

fn error_body(status: StatusCode, message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(json!({"error": {
            "code": status.as_u16(),
            "message": message
        }})),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::RequestTimeout => error_body(
                StatusCode::REQUEST_TIMEOUT,
                "Request took too long".to_string(),
            ),
            AppError::Report(e) => {
                let status = match &e {
                    ReportError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    ReportError::GenerationBackend { .. } | ReportError::SendFailed(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                error_body(status, e.to_string())
            }
        };
        tracing::error!("Error: {:?}", err.1);

        err.into_response()
    }
}
