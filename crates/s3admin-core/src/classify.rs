//! Provider error classification.
//!
//! [`ErrorClassifier`] is a total function from `(service, provider code)` to
//! an [`ApiError`]. Codes without a mapping become `BadRequest` with the
//! message prefixed by the failing operation.

use crate::error::{ApiError, ErrorKind};

/// The cloud service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudService {
    /// Object storage.
    Object,
    /// Identity and access management.
    Identity,
    /// Content distribution.
    Cdn,
    /// Authoritative DNS.
    Dns,
}

impl CloudService {
    /// Returns the service name as a string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "s3",
            Self::Identity => "iam",
            Self::Cdn => "cloudfront",
            Self::Dns => "route53",
        }
    }
}

/// Maps provider error codes onto [`ErrorKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassifier {
    /// Report CDN `NoSuch…` codes as `BadRequest` instead of `NotFound`.
    pub cdn_missing_as_bad_request: bool,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            cdn_missing_as_bad_request: true,
        }
    }
}

impl ErrorClassifier {
    /// Create a classifier.
    #[must_use]
    pub fn new(cdn_missing_as_bad_request: bool) -> Self {
        Self {
            cdn_missing_as_bad_request,
        }
    }

    /// The kind a provider code maps to, or `None` when the code is unknown.
    #[must_use]
    pub fn kind_for(&self, service: CloudService, code: &str) -> Option<ErrorKind> {
        match service {
            CloudService::Object => object_kind(code),
            CloudService::Identity => identity_kind(code),
            CloudService::Cdn => self.cdn_kind(code),
            CloudService::Dns => dns_kind(code),
        }
    }

    /// Classify a provider error response.
    ///
    /// The provider code becomes the error's machine tag. Unknown codes map to
    /// `BadRequest` with the message `"<context>: <provider message>"`.
    #[must_use]
    pub fn classify(
        &self,
        service: CloudService,
        context: &str,
        code: &str,
        message: Option<&str>,
    ) -> ApiError {
        let message = message.filter(|m| !m.is_empty()).unwrap_or(code);
        match self.kind_for(service, code) {
            Some(kind) => ApiError::new(kind, message).with_code(code),
            None => ApiError::bad_request(format!("{context}: {message}")).with_code(code),
        }
    }

    /// Classify a provider response that carried no error code.
    ///
    /// Object storage answers `HEAD` requests without a body, so only the
    /// HTTP status is available.
    #[must_use]
    pub fn classify_status(&self, context: &str, status: u16) -> ApiError {
        let kind = match status {
            400 => ErrorKind::BadRequest,
            401 | 403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::LimitExceeded,
            503 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::InternalError,
        };
        ApiError::new(kind, format!("{context}: provider returned HTTP {status}"))
    }

    /// Classify a failure that never produced a provider response.
    #[must_use]
    pub fn transport(
        &self,
        context: &str,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> ApiError {
        ApiError::internal(format!("{context}: {err}")).with_source(err)
    }

    fn cdn_kind(&self, code: &str) -> Option<ErrorKind> {
        if code.starts_with("TooMany") {
            return Some(ErrorKind::LimitExceeded);
        }
        if code.ends_with("AlreadyExists")
            || code.ends_with("InUse")
            || code == "DistributionNotDisabled"
            || code == "PreconditionFailed"
        {
            return Some(ErrorKind::Conflict);
        }
        if code.starts_with("NoSuch") {
            return Some(if self.cdn_missing_as_bad_request {
                ErrorKind::BadRequest
            } else {
                ErrorKind::NotFound
            });
        }
        if code == "AccessDenied" {
            return Some(ErrorKind::Forbidden);
        }
        None
    }
}

fn object_kind(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "NoSuchBucket"
        | "NotFound"
        | "NoSuchKey"
        | "NoSuchUpload"
        | "NoSuchBucketPolicy"
        | "NoSuchLifecycleConfiguration"
        | "NoSuchVersion"
        | "NoSuchTagSet"
        | "NoSuchWebsiteConfiguration"
        | "NoSuchCORSConfiguration"
        | "ServerSideEncryptionConfigurationNotFoundError" => ErrorKind::NotFound,
        "BucketAlreadyExists"
        | "BucketAlreadyOwnedByYou"
        | "BucketNotEmpty"
        | "InvalidBucketState"
        | "OperationAborted"
        | "RestoreAlreadyInProgress" => ErrorKind::Conflict,
        "AccessDenied"
        | "AccountProblem"
        | "AllAccessDisabled"
        | "Forbidden"
        | "InvalidAccessKeyId"
        | "SignatureDoesNotMatch" => ErrorKind::Forbidden,
        "MaxMessageLengthExceeded"
        | "MaxPostPreDataLengthExceededError"
        | "SlowDown"
        | "ServiceUnavailable"
        | "TooManyBuckets" => ErrorKind::LimitExceeded,
        "InternalError" | "PermanentRedirect" | "TemporaryRedirect" | "Redirect"
        | "RequestTimeout" => ErrorKind::ServiceUnavailable,
        _ if code.starts_with("Invalid")
            || code.starts_with("Malformed")
            || code.starts_with("Missing") =>
        {
            ErrorKind::BadRequest
        }
        _ => return None,
    };
    Some(kind)
}

fn identity_kind(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "NoSuchEntity" => ErrorKind::NotFound,
        "EntityAlreadyExists"
        | "DeleteConflict"
        | "ConcurrentModification"
        | "EntityTemporarilyUnmodifiable" => ErrorKind::Conflict,
        "LimitExceeded" | "Throttling" => ErrorKind::LimitExceeded,
        "AccessDenied" | "InvalidClientTokenId" | "NotAuthorized" => ErrorKind::Forbidden,
        "PolicyNotAttachable" | "UnmodifiableEntity" => ErrorKind::BadRequest,
        "ServiceFailure" => ErrorKind::ServiceUnavailable,
        _ if code.starts_with("Invalid") || code.starts_with("Malformed") => ErrorKind::BadRequest,
        _ => return None,
    };
    Some(kind)
}

fn dns_kind(code: &str) -> Option<ErrorKind> {
    if code.starts_with("NotAuthorized") {
        return Some(ErrorKind::Forbidden);
    }
    if code.ends_with("AlreadyExists") || code.starts_with("Conflicting") || code.ends_with("InUse")
    {
        return Some(ErrorKind::Conflict);
    }
    if code.starts_with("NoSuch")
        || code == "HostedZoneNotFound"
        || code == "VPCAssociationNotFound"
    {
        return Some(ErrorKind::NotFound);
    }
    if code.starts_with("Invalid")
        || code.starts_with("Malformed")
        || code == "PriorRequestNotComplete"
    {
        return Some(ErrorKind::BadRequest);
    }
    if code.starts_with("Limit") || code.starts_with("Throttling") || code.starts_with("TooMany") {
        return Some(ErrorKind::LimitExceeded);
    }
    None
}
