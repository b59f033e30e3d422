//! Response body type.
//!
//! Every admin response is known in full before it is sent: a JSON
//! document, the `pong` of `/ping`, the Prometheus text of `/metrics`, or
//! nothing at all for `HEAD` requests.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Response body of the admin API.
#[derive(Debug, Default)]
pub enum AdminResponseBody {
    /// JSON or text, sent as a single data frame.
    Buffered(Full<Bytes>),
    /// No body, as sent for `HEAD` on a bucket or website.
    #[default]
    Empty,
}

impl AdminResponseBody {
    /// The body of an empty response.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// A serialized JSON document, either an operation output or an error.
    #[must_use]
    pub fn from_json(json: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(json)))
    }

    /// Plain text such as `pong` or rendered metrics.
    #[must_use]
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(text.into())))
    }
}

impl http_body::Body for AdminResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;
    use http_body_util::BodyExt;

    use super::*;

    #[tokio::test]
    async fn test_should_yield_buffered_bytes() {
        let body = AdminResponseBody::from_string("pong");
        assert_eq!(body.size_hint().exact(), Some(4));
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn test_should_carry_json_document_unchanged() {
        let body = AdminResponseBody::from_json(br#"{"Bucket":"/b1"}"#.to_vec());
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"Bucket":"/b1"}"#);
    }

    #[test]
    fn test_should_end_empty_body_immediately() {
        let body = AdminResponseBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }
}
