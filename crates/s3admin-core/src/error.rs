//! Error taxonomy.
//!
//! Every failure the service reports falls into one of seven [`ErrorKind`]s.
//! The kind selects the HTTP status; the code is the machine tag written to
//! the `Code` field of the error body (a provider code such as
//! `BucketAlreadyOwnedByYou` when the failure came from a cloud call).

use std::fmt;

/// Kind of failure, mapped once to an HTTP status at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request or one of its parameters is invalid.
    BadRequest,
    /// The caller or the account credentials lack permission.
    Forbidden,
    /// The addressed resource does not exist.
    NotFound,
    /// The resource state conflicts with the request.
    Conflict,
    /// A quota or rate limit was hit.
    LimitExceeded,
    /// The provider is temporarily unavailable or the call timed out.
    ServiceUnavailable,
    /// Anything else.
    InternalError,
}

impl ErrorKind {
    /// Returns the kind as a string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::LimitExceeded => "LimitExceeded",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
        }
    }

    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub fn status_code(self) -> http::StatusCode {
        match self {
            Self::BadRequest => http::StatusCode::BAD_REQUEST,
            Self::Forbidden => http::StatusCode::FORBIDDEN,
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::Conflict => http::StatusCode::CONFLICT,
            Self::LimitExceeded => http::StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified service error.
#[derive(Debug)]
pub struct ApiError {
    /// The error kind.
    pub kind: ErrorKind,
    /// Machine readable tag.
    pub code: String,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result alias used across the workspace.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Create an error whose code is the kind tag.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.as_str().to_owned(),
            message: message.into(),
            source: None,
        }
    }

    /// Replace the machine tag.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        self.kind.status_code()
    }

    /// Whether this is a [`ErrorKind::NotFound`] error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Create a BadRequest error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Create a NotFound error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create an InternalError.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// The request deadline elapsed while `operation` was in flight.
    #[must_use]
    pub fn request_timeout(operation: &str) -> Self {
        Self::new(
            ErrorKind::ServiceUnavailable,
            format!("{operation}: request deadline exceeded"),
        )
        .with_code("RequestTimeout")
    }

    /// The client went away while `operation` was in flight.
    #[must_use]
    pub fn cancelled(operation: &str) -> Self {
        Self::new(
            ErrorKind::InternalError,
            format!("{operation}: request cancelled"),
        )
        .with_code("RequestCancelled")
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("invalid JSON: {err}"))
            .with_code("MalformedJSON")
            .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_every_kind_to_status() {
        let cases = [
            (ErrorKind::BadRequest, 400),
            (ErrorKind::Forbidden, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Conflict, 409),
            (ErrorKind::LimitExceeded, 429),
            (ErrorKind::ServiceUnavailable, 503),
            (ErrorKind::InternalError, 500),
        ];
        for (kind, status) in cases {
            assert_eq!(kind.status_code().as_u16(), status, "{kind}");
        }
    }

    #[test]
    fn test_should_default_code_to_kind_tag() {
        let err = ApiError::conflict("bucket is not empty");
        assert_eq!(err.code, "Conflict");
        assert_eq!(err.to_string(), "ApiError(Conflict): bucket is not empty");

        let err = err.with_code("BucketNotEmpty");
        assert_eq!(err.code, "BucketNotEmpty");
        assert_eq!(err.status_code(), http::StatusCode::CONFLICT);
    }

    #[test]
    fn test_should_expose_source() {
        let io = std::io::Error::other("boom");
        let err = ApiError::internal("wrapped").with_source(io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
    }

    #[test]
    fn test_should_tag_timeouts_and_cancellations() {
        let err = ApiError::request_timeout("CreateBucket");
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
        assert_eq!(err.code, "RequestTimeout");

        let err = ApiError::cancelled("CreateBucket");
        assert_eq!(err.kind, ErrorKind::InternalError);
        assert_eq!(err.code, "RequestCancelled");
    }
}
