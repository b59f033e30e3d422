//! Handler trait and operation dispatch.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::StatusCode;
use s3admin_core::{ApiError, ApiResult, CallContext};
use s3admin_model::input::{CreateBucketInput, CreateUserInput, PatchWebsiteInput, UpdateTagsInput};
use s3admin_provision::Provisioner;
use serde::de::DeserializeOwned;

use crate::body::AdminResponseBody;
use crate::response::{empty_response, json_response};
use crate::router::{Operation, Route};

/// Future returned by an [`AdminHandler`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = ApiResult<http::Response<AdminResponseBody>>> + Send>>;

/// Boundary between the HTTP transport and the provisioning workflows.
///
/// The handler receives a resolved account-scoped route, the raw JSON body
/// and the request's call context, and returns a complete HTTP response.
/// The future is `'static` so the service can run it on its own task.
pub trait AdminHandler: Send + Sync + 'static {
    /// Handle one account-scoped operation.
    fn handle_operation(&self, route: Route, body: Bytes, ctx: CallContext) -> HandlerFuture;
}

/// Dispatch a route to the handler.
pub fn dispatch_operation<H: AdminHandler>(
    handler: &H,
    route: Route,
    body: Bytes,
    ctx: CallContext,
) -> HandlerFuture {
    tracing::debug!(operation = %route.operation, account = %route.account, "dispatching operation");
    handler.handle_operation(route, body, ctx)
}

/// Handler that runs operations on the [`Provisioner`] of the addressed account.
#[derive(Debug, Clone, Default)]
pub struct ProvisionHandler {
    accounts: HashMap<String, Provisioner>,
}

impl ProvisionHandler {
    /// Create a handler serving the given provisioners, keyed by account name.
    #[must_use]
    pub fn new(provisioners: impl IntoIterator<Item = Provisioner>) -> Self {
        Self {
            accounts: provisioners
                .into_iter()
                .map(|p| (p.name().to_owned(), p))
                .collect(),
        }
    }

    /// The provisioner of `account`.
    #[must_use]
    pub fn provisioner(&self, account: &str) -> Option<&Provisioner> {
        self.accounts.get(account)
    }
}

impl AdminHandler for ProvisionHandler {
    fn handle_operation(&self, route: Route, body: Bytes, ctx: CallContext) -> HandlerFuture {
        let Some(provisioner) = self.accounts.get(&route.account).cloned() else {
            let err = ApiError::not_found(format!("account {} is not configured", route.account))
                .with_code("NoSuchAccount");
            return Box::pin(async move { Err(err) });
        };
        Box::pin(async move { run_operation(&provisioner, &route, &body, &ctx).await })
    }
}

async fn run_operation(
    p: &Provisioner,
    route: &Route,
    body: &Bytes,
    ctx: &CallContext,
) -> ApiResult<http::Response<AdminResponseBody>> {
    let name = route.resource();
    let user = route.user();

    match route.operation {
        Operation::ListBuckets => ok(&p.list_buckets(ctx).await?),
        Operation::CreateBucket => ok(&p.create_bucket(ctx, parse(body)?).await?),
        Operation::HeadBucket | Operation::HeadWebsite => {
            Ok(match p.bucket_exists(ctx, name).await {
                Ok(true) => empty_response(StatusCode::OK),
                Ok(false) => empty_response(StatusCode::NOT_FOUND),
                Err(err) => empty_response(err.status_code()),
            })
        }
        Operation::ShowBucket => ok(&p.show_bucket(ctx, name).await?),
        Operation::UpdateBucketTags => {
            let input: UpdateTagsInput = parse(body)?;
            ok(&p.update_bucket_tags(ctx, name, input).await?)
        }
        Operation::DeleteBucket => ok(&p.delete_bucket(ctx, name).await?),
        Operation::ListWebsites => ok(&p.list_websites(ctx).await?),
        Operation::CreateWebsite => {
            let out = p.create_website(ctx, parse::<CreateBucketInput>(body)?).await?;
            json_response(StatusCode::ACCEPTED, &out)
        }
        Operation::ShowWebsite => ok(&p.show_website(ctx, name).await?),
        Operation::UpdateWebsiteTags => {
            let input: UpdateTagsInput = parse(body)?;
            ok(&p.update_website_tags(ctx, name, input).await?)
        }
        Operation::PatchWebsite => {
            let input: PatchWebsiteInput = parse(body)?;
            ok(&p.patch_website(ctx, name, input).await?)
        }
        Operation::DeleteWebsite => {
            let out = p.delete_website(ctx, name).await?;
            let status = if out.distribution_pending {
                StatusCode::ACCEPTED
            } else {
                StatusCode::OK
            };
            json_response(status, &out)
        }
        Operation::ListUsers => ok(&p.list_users(ctx, name).await?),
        Operation::CreateUser => {
            let input: CreateUserInput = parse(body)?;
            ok(&p.create_user(ctx, name, input).await?)
        }
        Operation::ShowUser => ok(&p.show_user(ctx, user).await?),
        Operation::ResetUserKey => ok(&p.reset_user_key(ctx, user).await?),
        Operation::DeleteUser => ok(&p.delete_user(ctx, name, user).await?),
        Operation::Ping | Operation::Version | Operation::Metrics => Err(ApiError::internal(
            format!("{} is served by the transport", route.operation),
        )),
    }
}

fn ok<T: serde::Serialize>(value: &T) -> ApiResult<http::Response<AdminResponseBody>> {
    json_response(StatusCode::OK, value)
}

/// Parse a JSON request body; an empty body reads as `{}`.
fn parse<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http_body_util::BodyExt;
    use s3admin_core::{AccountConfig, Backend, ErrorClassifier};
    use s3admin_gateway::MemoryCloud;
    use s3admin_provision::SagaStats;

    use super::*;
    use crate::router::resolve_route;

    fn handler() -> (ProvisionHandler, MemoryCloud) {
        let account = AccountConfig::builder().backend(Backend::Memory).build();
        let cloud = MemoryCloud::new(&account, ErrorClassifier::new(false));
        let provisioner = Provisioner::new(
            "p1",
            account,
            cloud.gateways(),
            Arc::new(SagaStats::default()),
        );
        (ProvisionHandler::new([provisioner]), cloud)
    }

    async fn call(
        handler: &ProvisionHandler,
        method: http::Method,
        path: &str,
        body: &'static str,
    ) -> ApiResult<(StatusCode, serde_json::Value)> {
        let route = resolve_route(&method, path).unwrap();
        let response = dispatch_operation(
            handler,
            route,
            Bytes::from_static(body.as_bytes()),
            CallContext::default(),
        )
        .await?;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Ok((status, json))
    }

    #[tokio::test]
    async fn test_should_create_and_show_bucket() {
        let (handler, _cloud) = handler();
        let (status, json) = call(
            &handler,
            http::Method::POST,
            "/v1/s3/p1/buckets",
            r#"{"BucketInput":{"Bucket":"b1"},"Tags":[{"Key":"App","Value":"X"}]}"#,
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["Bucket"], "/b1");

        let (status, _) = call(&handler, http::Method::HEAD, "/v1/s3/p1/buckets/b1", "")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);

        let (status, json) = call(&handler, http::Method::GET, "/v1/s3/p1/buckets/b1", "")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["Tags"][0]["Key"], "App");
    }

    #[tokio::test]
    async fn test_should_answer_head_of_missing_bucket_with_404() {
        let (handler, _cloud) = handler();
        let (status, json) = call(&handler, http::Method::HEAD, "/v1/s3/p1/buckets/nope", "")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json.is_null());
    }

    #[tokio::test]
    async fn test_should_reject_unknown_account() {
        let (handler, cloud) = handler();
        let err = call(&handler, http::Method::GET, "/v1/s3/p2/buckets", "")
            .await
            .unwrap_err();
        assert_eq!(err.code, "NoSuchAccount");
        assert!(err.is_not_found());
        assert!(cloud.journal().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_malformed_json_before_any_call() {
        let (handler, cloud) = handler();
        let err = call(&handler, http::Method::POST, "/v1/s3/p1/buckets", "{not json")
            .await
            .unwrap_err();
        assert_eq!(err.code, "MalformedJSON");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(cloud.journal().is_empty());
    }

    #[test]
    fn test_should_read_empty_body_as_empty_object() {
        let input: UpdateTagsInput = parse(&Bytes::new()).unwrap();
        assert!(input.tags.is_empty());
        let input: PatchWebsiteInput = parse(&Bytes::from_static(b" \n")).unwrap();
        assert!(input.cache_invalidation.is_none());
    }
}
