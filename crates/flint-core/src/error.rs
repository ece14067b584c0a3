//! Error types shared across the framework.

use crate::response::StatusCode;

/// Error returned by handlers, interceptors and context I/O helpers.
///
/// A handler that returns `Err` without committing a response gets an
/// error response synthesized by the server façade: `Status` keeps its
/// code, everything else maps to 500.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem or transport I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or body-binding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error carrying an explicit HTTP status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

impl Error {
    /// Build a status-carrying error.
    #[must_use]
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a `400 Bad Request` error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, message)
    }

    /// The HTTP status this error translates to.
    #[must_use]
    pub fn response_status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Io(_) | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_code() {
        let err = Error::status(StatusCode::FORBIDDEN, "nope");
        assert_eq!(err.response_status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn io_error_maps_to_500() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.response_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
