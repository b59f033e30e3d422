//! Request routing: maps method and path onto an [`Operation`].
//!
//! ```text
//! /ping | /version | /metrics
//! /v1/s3/{account}/{buckets|websites}
//! /v1/s3/{account}/{buckets|websites}/{name}
//! /v1/s3/{account}/{buckets|websites}/{name}/users
//! /v1/s3/{account}/{buckets|websites}/{name}/users/{user}
//! ```
//!
//! An unknown path is a [`RouteError::NotFound`]; a known path with a method
//! it does not serve is a [`RouteError::MethodNotAllowed`].

use std::fmt;

use http::Method;
use percent_encoding::percent_decode_str;

/// Prefix of every account-scoped path.
pub const API_PREFIX: &str = "/v1/s3";

/// An operation of the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /ping`.
    Ping,
    /// `GET /version`.
    Version,
    /// `GET /metrics`.
    Metrics,
    /// List the account's buckets.
    ListBuckets,
    /// Bucket-Create workflow.
    CreateBucket,
    /// Bucket existence probe.
    HeadBucket,
    /// Bucket tags, logging and emptiness.
    ShowBucket,
    /// Replace the bucket's tag set.
    UpdateBucketTags,
    /// Bucket-Delete workflow.
    DeleteBucket,
    /// List distributions aliased to one of the account's domains.
    ListWebsites,
    /// Website-Create workflow.
    CreateWebsite,
    /// Website bucket existence probe.
    HeadWebsite,
    /// Website bucket, distribution and DNS record.
    ShowWebsite,
    /// Replace the tags of the website bucket and distribution.
    UpdateWebsiteTags,
    /// Cache invalidation.
    PatchWebsite,
    /// Website-Delete workflow.
    DeleteWebsite,
    /// Users of a bucket.
    ListUsers,
    /// User-Create workflow.
    CreateUser,
    /// A user with keys and groups.
    ShowUser,
    /// User-Key-Reset workflow.
    ResetUserKey,
    /// User-Delete workflow.
    DeleteUser,
}

impl Operation {
    /// Returns the operation name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "Ping",
            Self::Version => "Version",
            Self::Metrics => "Metrics",
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::HeadBucket => "HeadBucket",
            Self::ShowBucket => "ShowBucket",
            Self::UpdateBucketTags => "UpdateBucketTags",
            Self::DeleteBucket => "DeleteBucket",
            Self::ListWebsites => "ListWebsites",
            Self::CreateWebsite => "CreateWebsite",
            Self::HeadWebsite => "HeadWebsite",
            Self::ShowWebsite => "ShowWebsite",
            Self::UpdateWebsiteTags => "UpdateWebsiteTags",
            Self::PatchWebsite => "PatchWebsite",
            Self::DeleteWebsite => "DeleteWebsite",
            Self::ListUsers => "ListUsers",
            Self::CreateUser => "CreateUser",
            Self::ShowUser => "ShowUser",
            Self::ResetUserKey => "ResetUserKey",
            Self::DeleteUser => "DeleteUser",
        }
    }

    /// Whether the operation is served without a token.
    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Self::Ping | Self::Version | Self::Metrics)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// The operation to run.
    pub operation: Operation,
    /// Account name; empty for public operations.
    pub account: String,
    /// Bucket or website name.
    pub resource: Option<String>,
    /// User name.
    pub user: Option<String>,
}

impl Route {
    fn public(operation: Operation) -> Self {
        Self {
            operation,
            account: String::new(),
            resource: None,
            user: None,
        }
    }

    /// The bucket or website name, empty when the path has none.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_deref().unwrap_or_default()
    }

    /// The user name, empty when the path has none.
    #[must_use]
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or_default()
    }
}

/// Routing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No route matches the path.
    #[error("no route for {0}")]
    NotFound(String),
    /// The path exists but does not serve the method.
    #[error("method {method} is not allowed on {path}")]
    MethodNotAllowed {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
    },
}

impl RouteError {
    /// HTTP status of the failure.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::NotFound(_) => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => http::StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Error tag written to the `Code` field.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NoSuchRoute",
            Self::MethodNotAllowed { .. } => "MethodNotAllowed",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Buckets,
    Websites,
}

/// Resolve `method` and `path` to a [`Route`].
pub fn resolve_route(method: &Method, path: &str) -> Result<Route, RouteError> {
    let not_found = || RouteError::NotFound(path.to_owned());
    let not_allowed = || RouteError::MethodNotAllowed {
        method: method.clone(),
        path: path.to_owned(),
    };

    let public = match path {
        "/ping" => Some(Operation::Ping),
        "/version" => Some(Operation::Version),
        "/metrics" => Some(Operation::Metrics),
        _ => None,
    };
    if let Some(op) = public {
        return if *method == Method::GET {
            Ok(Route::public(op))
        } else {
            Err(not_allowed())
        };
    }

    let rest = path
        .strip_prefix(API_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(not_found)?;
    let segments: Vec<String> = rest
        .trim_end_matches('/')
        .split('/')
        .map(decode)
        .collect();
    if segments.iter().any(String::is_empty) {
        return Err(not_found());
    }

    let (account, kind) = match segments.as_slice() {
        [account, kind, ..] => match kind.as_str() {
            "buckets" => (account.clone(), Kind::Buckets),
            "websites" => (account.clone(), Kind::Websites),
            _ => return Err(not_found()),
        },
        _ => return Err(not_found()),
    };
    let resource = segments.get(2).cloned();
    let user = segments.get(4).cloned();

    let operation = match (segments.len(), segments.get(3).map(String::as_str)) {
        (2, None) => collection(method, kind),
        (3, None) => item(method, kind),
        (4, Some("users")) => users(method),
        (5, Some("users")) => user_item(method),
        _ => return Err(not_found()),
    }
    .ok_or_else(not_allowed)?;

    Ok(Route {
        operation,
        account,
        resource,
        user,
    })
}

fn collection(method: &Method, kind: Kind) -> Option<Operation> {
    match (method, kind) {
        (&Method::GET, Kind::Buckets) => Some(Operation::ListBuckets),
        (&Method::POST, Kind::Buckets) => Some(Operation::CreateBucket),
        (&Method::GET, Kind::Websites) => Some(Operation::ListWebsites),
        (&Method::POST, Kind::Websites) => Some(Operation::CreateWebsite),
        _ => None,
    }
}

fn item(method: &Method, kind: Kind) -> Option<Operation> {
    match (method, kind) {
        (&Method::HEAD, Kind::Buckets) => Some(Operation::HeadBucket),
        (&Method::GET, Kind::Buckets) => Some(Operation::ShowBucket),
        (&Method::PUT, Kind::Buckets) => Some(Operation::UpdateBucketTags),
        (&Method::DELETE, Kind::Buckets) => Some(Operation::DeleteBucket),
        (&Method::HEAD, Kind::Websites) => Some(Operation::HeadWebsite),
        (&Method::GET, Kind::Websites) => Some(Operation::ShowWebsite),
        (&Method::PUT, Kind::Websites) => Some(Operation::UpdateWebsiteTags),
        (&Method::PATCH, Kind::Websites) => Some(Operation::PatchWebsite),
        (&Method::DELETE, Kind::Websites) => Some(Operation::DeleteWebsite),
        _ => None,
    }
}

fn users(method: &Method) -> Option<Operation> {
    match *method {
        Method::GET => Some(Operation::ListUsers),
        Method::POST => Some(Operation::CreateUser),
        _ => None,
    }
}

fn user_item(method: &Method) -> Option<Operation> {
    match *method {
        Method::GET => Some(Operation::ShowUser),
        Method::PUT => Some(Operation::ResetUserKey),
        Method::DELETE => Some(Operation::DeleteUser),
        _ => None,
    }
}

/// Decode a percent-encoded path segment.
fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_all_operations() {
        let cases = [
            (Method::GET, "/ping", Operation::Ping),
            (Method::GET, "/version", Operation::Version),
            (Method::GET, "/metrics", Operation::Metrics),
            (Method::GET, "/v1/s3/p1/buckets", Operation::ListBuckets),
            (Method::POST, "/v1/s3/p1/buckets", Operation::CreateBucket),
            (Method::HEAD, "/v1/s3/p1/buckets/b1", Operation::HeadBucket),
            (Method::GET, "/v1/s3/p1/buckets/b1", Operation::ShowBucket),
            (Method::PUT, "/v1/s3/p1/buckets/b1", Operation::UpdateBucketTags),
            (Method::DELETE, "/v1/s3/p1/buckets/b1", Operation::DeleteBucket),
            (Method::GET, "/v1/s3/p1/websites", Operation::ListWebsites),
            (Method::POST, "/v1/s3/p1/websites", Operation::CreateWebsite),
            (Method::HEAD, "/v1/s3/p1/websites/a.example.com", Operation::HeadWebsite),
            (Method::GET, "/v1/s3/p1/websites/a.example.com", Operation::ShowWebsite),
            (Method::PUT, "/v1/s3/p1/websites/a.example.com", Operation::UpdateWebsiteTags),
            (Method::PATCH, "/v1/s3/p1/websites/a.example.com", Operation::PatchWebsite),
            (Method::DELETE, "/v1/s3/p1/websites/a.example.com", Operation::DeleteWebsite),
            (Method::GET, "/v1/s3/p1/buckets/b1/users", Operation::ListUsers),
            (Method::POST, "/v1/s3/p1/websites/w1/users", Operation::CreateUser),
            (Method::GET, "/v1/s3/p1/buckets/b1/users/u1", Operation::ShowUser),
            (Method::PUT, "/v1/s3/p1/buckets/b1/users/u1", Operation::ResetUserKey),
            (Method::DELETE, "/v1/s3/p1/websites/w1/users/u1", Operation::DeleteUser),
        ];

        for (method, path, expected) in cases {
            let route = resolve_route(&method, path).unwrap_or_else(|e| panic!("{path}: {e}"));
            assert_eq!(route.operation, expected, "{method} {path}");
        }
    }

    #[test]
    fn test_should_extract_path_parameters() {
        let route = resolve_route(&Method::DELETE, "/v1/s3/p1/buckets/b1/users/u%201").unwrap();
        assert_eq!(route.account, "p1");
        assert_eq!(route.resource(), "b1");
        assert_eq!(route.user(), "u 1");

        let route = resolve_route(&Method::GET, "/v1/s3/p1/buckets/").unwrap();
        assert_eq!(route.operation, Operation::ListBuckets);
        assert!(route.resource.is_none());
    }

    #[test]
    fn test_should_reject_unknown_paths() {
        for path in [
            "/",
            "/v1/s3",
            "/v1/s3/p1",
            "/v1/s3/p1/tables",
            "/v1/s3/p1/buckets/b1/keys",
            "/v1/s3/p1/buckets/b1/users/u1/extra",
            "/v1/s3/p1//b1",
            "/v2/s3/p1/buckets",
        ] {
            let err = resolve_route(&Method::GET, path).unwrap_err();
            assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[test]
    fn test_should_reject_unsupported_methods() {
        let cases = [
            (Method::POST, "/ping"),
            (Method::DELETE, "/v1/s3/p1/buckets"),
            (Method::PATCH, "/v1/s3/p1/buckets/b1"),
            (Method::PUT, "/v1/s3/p1/buckets/b1/users"),
            (Method::POST, "/v1/s3/p1/buckets/b1/users/u1"),
        ];
        for (method, path) in cases {
            let err = resolve_route(&method, path).unwrap_err();
            assert_eq!(err.code(), "MethodNotAllowed", "{method} {path}");
            assert_eq!(err.status_code(), http::StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    #[test]
    fn test_should_mark_only_liveness_endpoints_public() {
        assert!(Operation::Ping.is_public());
        assert!(Operation::Metrics.is_public());
        assert!(!Operation::ListBuckets.is_public());
        assert!(!Operation::DeleteUser.is_public());
    }
}
