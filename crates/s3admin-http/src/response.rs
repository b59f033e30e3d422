//! Response serialization and error formatting.

use s3admin_core::{ApiError, ApiResult};
use s3admin_model::output::ErrorOutput;
use serde::Serialize;

use crate::body::AdminResponseBody;

/// Content type of JSON responses.
pub const CONTENT_TYPE: &str = "application/json";

/// Content type of `/ping`.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Content type of `/metrics`.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Serialize an error body.
///
/// ```json
/// {
///   "Code": "BucketAlreadyOwnedByYou",
///   "Message": "...",
///   "RequestId": "3f1c..."
/// }
/// ```
#[must_use]
pub fn error_to_json(code: &str, message: &str, request_id: &str) -> Vec<u8> {
    serde_json::to_vec(&ErrorOutput {
        code: code.to_owned(),
        message: message.to_owned(),
        request_id: request_id.to_owned(),
    })
    .expect("JSON serialization of error cannot fail")
}

/// Build an error response with an explicit status.
#[must_use]
pub fn error_response(
    status: http::StatusCode,
    code: &str,
    message: &str,
    request_id: &str,
) -> http::Response<AdminResponseBody> {
    http::Response::builder()
        .status(status)
        .header("content-type", CONTENT_TYPE)
        .header(REQUEST_ID_HEADER, request_id)
        .body(AdminResponseBody::from_json(error_to_json(
            code, message, request_id,
        )))
        .expect("valid error response")
}

/// Convert an [`ApiError`] into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &ApiError, request_id: &str) -> http::Response<AdminResponseBody> {
    error_response(error.status_code(), &error.code, &error.message, request_id)
}

/// Build a JSON response.
pub fn json_response<T: Serialize>(
    status: http::StatusCode,
    value: &T,
) -> ApiResult<http::Response<AdminResponseBody>> {
    let json = serde_json::to_vec(value)
        .map_err(|e| ApiError::internal(format!("failed to serialize response: {e}")))?;
    Ok(http::Response::builder()
        .status(status)
        .header("content-type", CONTENT_TYPE)
        .body(AdminResponseBody::from_json(json))
        .expect("valid JSON response"))
}

/// Build a text response.
#[must_use]
pub fn text_response(
    text: impl Into<String>,
    content_type: &'static str,
) -> http::Response<AdminResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("content-type", content_type)
        .body(AdminResponseBody::from_string(text))
        .expect("valid text response")
}

/// Build a response without a body.
#[must_use]
pub fn empty_response(status: http::StatusCode) -> http::Response<AdminResponseBody> {
    http::Response::builder()
        .status(status)
        .body(AdminResponseBody::empty())
        .expect("valid empty response")
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use s3admin_core::ErrorKind;

    use super::*;

    async fn body_json(response: http::Response<AdminResponseBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_should_format_error_json() {
        let json = error_to_json("NoSuchBucket", "bucket b1 does not exist", "r1");
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed["Code"], "NoSuchBucket");
        assert_eq!(parsed["Message"], "bucket b1 does not exist");
        assert_eq!(parsed["RequestId"], "r1");
    }

    #[tokio::test]
    async fn test_should_map_error_kind_to_status() {
        let err = ApiError::new(ErrorKind::LimitExceeded, "slow down").with_code("Throttling");
        let response = error_to_response(&err, "r2");

        assert_eq!(response.status(), http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("content-type").unwrap(), CONTENT_TYPE);
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "r2");
        let json = body_json(response).await;
        assert_eq!(json["Code"], "Throttling");
    }

    #[tokio::test]
    async fn test_should_build_json_response_with_status() {
        let response = json_response(
            http::StatusCode::ACCEPTED,
            &serde_json::json!({"Bucket": "b1"}),
        )
        .unwrap();

        assert_eq!(response.status(), http::StatusCode::ACCEPTED);
        assert_eq!(response.headers().get("content-type").unwrap(), CONTENT_TYPE);
        assert_eq!(body_json(response).await["Bucket"], "b1");
    }

    #[test]
    fn test_should_build_empty_response() {
        let response = empty_response(http::StatusCode::NOT_FOUND);
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
        assert!(response.headers().get("content-type").is_none());
    }
}
