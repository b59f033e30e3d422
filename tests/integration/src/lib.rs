//! End-to-end scenario tests for the s3admin API.
//!
//! Each test drives an in-process [`AdminHttpService`] backed by the
//! in-memory gateways, so no network or cloud account is needed:
//!
//! ```text
//! cargo test -p s3admin-integration
//! ```

mod test_bucket;
mod test_user;
mod test_website;

use std::collections::HashMap;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::Service;
use s3admin_core::{AccountConfig, Backend, DomainRegistration, ErrorClassifier};
use s3admin_gateway::MemoryCloud;
use s3admin_http::{AdminHttpConfig, AdminHttpService, Metrics, ProvisionHandler};
use s3admin_provision::{Provisioner, SagaStats};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Shared secret configured on every test server.
pub const TOKEN: &str = "integration-token";

/// Account served by every test server.
pub const ACCOUNT: &str = "provider1";

/// Hosted zone of `example.com`.
pub const ZONE: &str = "Z0EXAMPLE";

/// Status and parsed JSON body of one response.
#[derive(Debug)]
pub struct TestResponse {
    /// Response status.
    pub status: http::StatusCode,
    /// Parsed body, `Null` when empty or not JSON.
    pub json: serde_json::Value,
}

/// An in-process server over an in-memory cloud.
#[derive(Debug)]
pub struct TestServer {
    /// The HTTP service.
    pub service: AdminHttpService<ProvisionHandler>,
    /// The emulated cloud of [`ACCOUNT`].
    pub cloud: MemoryCloud,
}

impl TestServer {
    /// Start a server with one memory-backed account owning `example.com`.
    #[must_use]
    pub fn new() -> Self {
        init_tracing();

        let account = AccountConfig::builder()
            .backend(Backend::Memory)
            .domains(HashMap::from([(
                "example.com".to_owned(),
                DomainRegistration {
                    cert_arn: "arn:aws:acm:us-east-1:000000000000:certificate/example".to_owned(),
                    hosted_zone_id: ZONE.to_owned(),
                },
            )]))
            .build();
        let cloud = MemoryCloud::new(&account, ErrorClassifier::new(false));
        let stats = Arc::new(SagaStats::default());
        let provisioner = Provisioner::new(ACCOUNT, account, cloud.gateways(), Arc::clone(&stats));

        let service = AdminHttpService::new(
            Arc::new(ProvisionHandler::new([provisioner])),
            AdminHttpConfig {
                token: TOKEN.to_owned(),
                ..AdminHttpConfig::default()
            },
            Arc::new(Metrics::new(stats)),
        );
        Self { service, cloud }
    }

    /// Send an authenticated request to `/v1/s3/{ACCOUNT}{path}`.
    pub async fn send(
        &self,
        method: http::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        self.raw(method, &format!("/v1/s3/{ACCOUNT}{path}"), Some(TOKEN), body)
            .await
    }

    /// Send a request to an absolute path with an optional token.
    pub async fn raw(
        &self,
        method: http::Method,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("x-auth-token", token);
        }
        let body = body.map_or_else(Bytes::new, |json| Bytes::from(json.to_string()));
        let request = builder.body(Full::new(body)).expect("valid request");

        let response = self.service.call(request).await.expect("infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("buffered body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        TestResponse { status, json }
    }

    /// Body of `/metrics`.
    pub async fn metrics(&self) -> String {
        let request = http::Request::builder()
            .uri("/metrics")
            .body(Full::new(Bytes::new()))
            .expect("valid request");
        let response = self.service.call(request).await.expect("infallible");
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("buffered body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Body of a bucket or website create request.
#[must_use]
pub fn create_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "BucketInput": {"Bucket": name},
        "Tags": [{"Key": "Team", "Value": "web"}],
    })
}
