//! Admin HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt;
use s3admin_core::context::DEFAULT_TIMEOUT;
use s3admin_core::{ApiError, ApiResult, CallContext};
use s3admin_model::output::VersionOutput;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};

use crate::auth::verify_token;
use crate::body::AdminResponseBody;
use crate::dispatch::{AdminHandler, dispatch_operation};
use crate::metrics::{Metrics, UNROUTED};
use crate::response::{
    METRICS_CONTENT_TYPE, REQUEST_ID_HEADER, TEXT_CONTENT_TYPE, error_response, error_to_response,
    json_response, text_response,
};
use crate::router::{Operation, Route, resolve_route};

/// Configuration for the admin HTTP service.
#[derive(Clone)]
pub struct AdminHttpConfig {
    /// Shared secret expected in `X-Auth-Token`.
    pub token: String,
    /// Deadline of each request's workflow.
    pub request_timeout: Duration,
    /// Build information served on `/version`.
    pub version: VersionOutput,
}

impl std::fmt::Debug for AdminHttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminHttpConfig")
            .field("token", &"...")
            .field("request_timeout", &self.request_timeout)
            .field("version", &self.version)
            .finish()
    }
}

impl Default for AdminHttpConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            request_timeout: DEFAULT_TIMEOUT,
            version: VersionOutput {
                version: env!("CARGO_PKG_VERSION").to_owned(),
                githash: "unknown".to_owned(),
                buildstamp: "unknown".to_owned(),
            },
        }
    }
}

/// Hyper `Service` implementation for the admin API.
///
/// Resolves the route, serves the public probes, checks the token and hands
/// account-scoped operations to an [`AdminHandler`]. Each operation runs on
/// a task of its own; dropping the response future (the client went away)
/// cancels the operation's [`CallContext`].
#[derive(Debug)]
pub struct AdminHttpService<H: AdminHandler> {
    handler: Arc<H>,
    config: Arc<AdminHttpConfig>,
    metrics: Arc<Metrics>,
}

impl<H: AdminHandler> AdminHttpService<H> {
    /// Create a new `AdminHttpService`.
    pub fn new(handler: Arc<H>, config: AdminHttpConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            handler,
            config: Arc::new(config),
            metrics,
        }
    }

    /// The service's counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl<H: AdminHandler> Clone for AdminHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<H, B> hyper::service::Service<http::Request<B>> for AdminHttpService<H>
where
    H: AdminHandler,
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    type Response = http::Response<AdminResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let config = Arc::clone(&self.config);
        let metrics = Arc::clone(&self.metrics);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let (operation, response) =
                process_request(req, &handler, &config, &metrics, &request_id).await;
            metrics.record(operation, response.status());
            debug!(operation, status = response.status().as_u16(), %request_id, "request served");
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Process a single request through the full pipeline. Returns the
/// operation label used for metrics alongside the response.
async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &Arc<H>,
    config: &AdminHttpConfig,
    metrics: &Metrics,
    request_id: &str,
) -> (&'static str, http::Response<AdminResponseBody>)
where
    H: AdminHandler,
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    let (parts, incoming) = req.into_parts();

    // 1. Route.
    let route = match resolve_route(&parts.method, parts.uri.path()) {
        Ok(route) => route,
        Err(err) => {
            let response =
                error_response(err.status_code(), err.code(), &err.to_string(), request_id);
            return (UNROUTED, response);
        }
    };
    let label = route.operation.as_str();

    // 2. Public probes.
    if route.operation.is_public() {
        return (
            label,
            public_response(route.operation, config, metrics, request_id),
        );
    }

    // 3. Authenticate.
    if let Err(err) = verify_token(&parts.headers, &config.token) {
        let response = error_response(
            http::StatusCode::UNAUTHORIZED,
            err.code(),
            &err.to_string(),
            request_id,
        );
        return (label, response);
    }

    // 4. Collect body.
    let body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => return (label, error_to_response(&err, request_id)),
    };

    // 5. Run the operation.
    let response = match run_operation(handler, route, body, config.request_timeout, request_id)
        .await
    {
        Ok(response) => response,
        Err(err) => error_to_response(&err, request_id),
    };
    (label, response)
}

/// Answer an operation that needs no token.
fn public_response(
    operation: Operation,
    config: &AdminHttpConfig,
    metrics: &Metrics,
    request_id: &str,
) -> http::Response<AdminResponseBody> {
    match operation {
        Operation::Ping => text_response("pong", TEXT_CONTENT_TYPE),
        Operation::Version => json_response(http::StatusCode::OK, &config.version)
            .unwrap_or_else(|err| error_to_response(&err, request_id)),
        Operation::Metrics => text_response(metrics.render(), METRICS_CONTENT_TYPE),
        other => error_to_response(
            &ApiError::internal(format!("{other} requires authentication")),
            request_id,
        ),
    }
}

/// Run an operation on its own task under a fresh [`CallContext`].
///
/// The drop guard cancels the context if this future is dropped before the
/// task finishes; the task itself keeps running so a workflow can still roll
/// back.
async fn run_operation<H: AdminHandler>(
    handler: &Arc<H>,
    route: Route,
    body: Bytes,
    timeout: Duration,
    request_id: &str,
) -> ApiResult<http::Response<AdminResponseBody>> {
    let token = CancellationToken::new();
    let ctx = CallContext::new(token.clone(), timeout);
    let span = info_span!(
        "operation",
        operation = %route.operation,
        account = %route.account,
        request_id,
    );

    let guard = token.drop_guard();
    let task = tokio::spawn(dispatch_operation(handler.as_ref(), route, body, ctx).instrument(span));
    let joined = task.await;
    guard.disarm();

    joined.map_err(|e| ApiError::internal(format!("operation task failed: {e}")))?
}

/// Collect the request body into a single `Bytes` buffer.
async fn collect_body<B>(incoming: B) -> ApiResult<Bytes>
where
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    incoming
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| ApiError::bad_request(format!("failed to read request body: {e}")))
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: http::Response<AdminResponseBody>,
    request_id: &str,
) -> http::Response<AdminResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry(REQUEST_ID_HEADER).or_insert(hv);
    }

    headers.insert("server", http::HeaderValue::from_static("s3admin"));

    response
}
