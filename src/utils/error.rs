use actix_web::http::StatusCode;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Capture privileges are missing; raised when opening the source,
    /// never deferred to the first read
    #[error("permission denied opening capture on '{0}'")]
    PermissionDenied(String),

    /// The requested capture interface does not exist
    #[error("interface not found: '{0}'")]
    InterfaceNotFound(String),

    /// A capture session is already running
    #[error("capture is already running")]
    AlreadyRunning,

    /// The capture loop ended on its own (interface vanished or persistent
    /// read errors); surfaced through status polls
    #[error("capture interrupted: {0}")]
    CaptureInterrupted(String),

    /// The datalink channel could not be created
    #[error("capture channel error: {0}")]
    Channel(String),

    /// Malformed request parameter
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Error from I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status this error maps to at the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::InterfaceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyRunning => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::CaptureInterrupted(_)
            | AppError::Channel(_)
            | AppError::Io(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::AlreadyRunning.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InterfaceNotFound("eth9".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::PermissionDenied("eth0".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::BadRequest("nope".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
