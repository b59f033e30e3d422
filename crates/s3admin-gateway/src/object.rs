//! Object storage gateway.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use s3admin_core::{ApiResult, CallContext};
use s3admin_model::{
    BucketSummary, LoggingTarget, PolicyDocument, ServerSideEncryption, Tag, WebsiteConfiguration,
};

/// Key predicate used by [`ObjectGateway::bucket_empty_with_filter`].
pub type KeyFilter<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// Bucket operations of the object storage service.
#[async_trait]
pub trait ObjectGateway: Send + Sync + fmt::Debug {
    /// Whether the bucket exists. A missing bucket is `false`; a bucket owned
    /// by someone else is a `Forbidden` error.
    async fn bucket_exists(&self, ctx: &CallContext, name: &str) -> ApiResult<bool>;

    /// Create a bucket in `region` and return its location.
    async fn create_bucket(&self, ctx: &CallContext, name: &str, region: &str)
    -> ApiResult<String>;

    /// Delete a bucket. Fails with `Conflict` when it still holds objects.
    async fn delete_empty_bucket(&self, ctx: &CallContext, name: &str) -> ApiResult<()>;

    /// List the account's buckets.
    async fn list_buckets(&self, ctx: &CallContext) -> ApiResult<Vec<BucketSummary>>;

    /// The bucket's tags; empty when the bucket has no tag set.
    async fn get_bucket_tags(&self, ctx: &CallContext, name: &str) -> ApiResult<Vec<Tag>>;

    /// Replace the bucket's tag set.
    async fn put_bucket_tags(&self, ctx: &CallContext, name: &str, tags: &[Tag])
    -> ApiResult<()>;

    /// Enable static website hosting.
    async fn put_website_config(
        &self,
        ctx: &CallContext,
        name: &str,
        config: &WebsiteConfiguration,
    ) -> ApiResult<()>;

    /// Attach a bucket policy.
    async fn put_bucket_policy(
        &self,
        ctx: &CallContext,
        name: &str,
        document: &PolicyDocument,
    ) -> ApiResult<()>;

    /// Set default encryption.
    async fn put_bucket_encryption(
        &self,
        ctx: &CallContext,
        name: &str,
        encryption: &ServerSideEncryption,
    ) -> ApiResult<()>;

    /// Deliver access logs to `log_bucket` under `<prefix>/<name>/`.
    async fn put_bucket_logging(
        &self,
        ctx: &CallContext,
        name: &str,
        log_bucket: &str,
        prefix: Option<&str>,
    ) -> ApiResult<()>;

    /// The bucket's access log target, if logging is enabled.
    async fn get_bucket_logging(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> ApiResult<Option<LoggingTarget>>;

    /// Up to `max` object keys of the bucket.
    async fn list_object_keys(&self, ctx: &CallContext, name: &str, max: i32)
    -> ApiResult<Vec<String>>;

    /// Store an object.
    async fn put_object(&self, ctx: &CallContext, name: &str, key: &str, body: Bytes)
    -> ApiResult<()>;

    /// Whether the bucket holds no objects.
    async fn bucket_empty(&self, ctx: &CallContext, name: &str) -> ApiResult<bool> {
        self.bucket_empty_with_filter(ctx, name, 1, &|_: &str| true).await
    }

    /// Whether none of the first `max` keys satisfies `predicate`.
    async fn bucket_empty_with_filter(
        &self,
        ctx: &CallContext,
        name: &str,
        max: i32,
        predicate: KeyFilter<'_>,
    ) -> ApiResult<bool> {
        let keys = self.list_object_keys(ctx, name, max).await?;
        Ok(!keys.iter().any(|key| predicate(key)))
    }
}
