//! In-memory object storage.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService, naming};
use s3admin_model::{
    BucketSummary, IndexDocument, LoggingTarget, PolicyDocument, ServerSideEncryption, Tag,
    WebsiteConfiguration,
};
use tracing::info;

use super::Harness;
use crate::object::ObjectGateway;

const SERVICE: CloudService = CloudService::Object;

#[derive(Debug, Clone)]
struct MemoryBucket {
    creation_date: DateTime<Utc>,
    tags: Vec<Tag>,
    website: Option<WebsiteConfiguration>,
    policy: Option<String>,
    encryption: Option<ServerSideEncryption>,
    logging: Option<LoggingTarget>,
    objects: BTreeMap<String, Bytes>,
}

impl MemoryBucket {
    fn new() -> Self {
        Self {
            creation_date: Utc::now(),
            tags: Vec::new(),
            website: None,
            policy: None,
            encryption: None,
            logging: None,
            objects: BTreeMap::new(),
        }
    }
}

/// [`ObjectGateway`] backed by a concurrent map of buckets.
#[derive(Debug)]
pub struct MemoryObjectGateway {
    harness: Arc<Harness>,
    buckets: DashMap<String, MemoryBucket>,
    recreate_owned: AtomicBool,
}

impl MemoryObjectGateway {
    pub(crate) fn new(harness: Arc<Harness>) -> Self {
        Self {
            harness,
            buckets: DashMap::new(),
            recreate_owned: AtomicBool::new(false),
        }
    }

    fn no_such_bucket(&self, operation: &str, name: &str) -> ApiError {
        self.harness.error(
            SERVICE,
            operation,
            "NoSuchBucket",
            format!("The specified bucket does not exist: {name}"),
        )
    }

    fn with_bucket<T>(
        &self,
        operation: &str,
        name: &str,
        f: impl FnOnce(&mut MemoryBucket) -> T,
    ) -> ApiResult<T> {
        let mut bucket = self
            .buckets
            .get_mut(name)
            .ok_or_else(|| self.no_such_bucket(operation, name))?;
        Ok(f(&mut bucket))
    }

    /// Let `CreateBucket` succeed for a bucket that already exists, as S3
    /// does in `us-east-1` for buckets the caller owns.
    pub fn set_recreate_owned(&self, enabled: bool) {
        self.recreate_owned.store(enabled, Ordering::Relaxed);
    }

    /// Whether a bucket with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// The stored bucket policy.
    #[must_use]
    pub fn bucket_policy(&self, name: &str) -> Option<String> {
        self.buckets.get(name).and_then(|b| b.policy.clone())
    }

    /// The stored website configuration.
    #[must_use]
    pub fn website(&self, name: &str) -> Option<WebsiteConfiguration> {
        self.buckets.get(name).and_then(|b| b.website.clone())
    }

    /// The stored default encryption.
    #[must_use]
    pub fn encryption(&self, name: &str) -> Option<ServerSideEncryption> {
        self.buckets.get(name).and_then(|b| b.encryption.clone())
    }
}

#[async_trait]
impl ObjectGateway for MemoryObjectGateway {
    async fn bucket_exists(&self, ctx: &CallContext, name: &str) -> ApiResult<bool> {
        self.harness
            .call(ctx, SERVICE, "HeadBucket", async {
                Ok(self.buckets.contains_key(name))
            })
            .await
    }

    async fn create_bucket(
        &self,
        ctx: &CallContext,
        name: &str,
        region: &str,
    ) -> ApiResult<String> {
        self.harness
            .call(ctx, SERVICE, "CreateBucket", async {
                if name.is_empty() {
                    return Err(self.harness.error(
                        SERVICE,
                        "CreateBucket",
                        "InvalidBucketName",
                        "The specified bucket is not valid",
                    ));
                }
                match self.buckets.entry(name.to_owned()) {
                    Entry::Occupied(_) if self.recreate_owned.load(Ordering::Relaxed) => {
                        Ok(format!("/{name}"))
                    }
                    Entry::Occupied(_) => Err(self.harness.error(
                        SERVICE,
                        "CreateBucket",
                        "BucketAlreadyOwnedByYou",
                        format!("The bucket {name} is already owned by you"),
                    )),
                    Entry::Vacant(slot) => {
                        slot.insert(MemoryBucket::new());
                        info!(bucket = %name, region, "bucket created");
                        Ok(format!("/{name}"))
                    }
                }
            })
            .await
    }

    async fn delete_empty_bucket(&self, ctx: &CallContext, name: &str) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DeleteBucket", async {
                let empty = self.with_bucket("DeleteBucket", name, |b| b.objects.is_empty())?;
                if !empty {
                    return Err(self.harness.error(
                        SERVICE,
                        "DeleteBucket",
                        "BucketNotEmpty",
                        format!("The bucket {name} is not empty"),
                    ));
                }
                self.buckets.remove(name);
                info!(bucket = %name, "bucket deleted");
                Ok(())
            })
            .await
    }

    async fn list_buckets(&self, ctx: &CallContext) -> ApiResult<Vec<BucketSummary>> {
        self.harness
            .call(ctx, SERVICE, "ListBuckets", async {
                let mut buckets: Vec<BucketSummary> = self
                    .buckets
                    .iter()
                    .map(|entry| BucketSummary {
                        name: entry.key().clone(),
                        creation_date: Some(entry.value().creation_date),
                    })
                    .collect();
                buckets.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(buckets)
            })
            .await
    }

    async fn get_bucket_tags(&self, ctx: &CallContext, name: &str) -> ApiResult<Vec<Tag>> {
        self.harness
            .call(ctx, SERVICE, "GetBucketTagging", async {
                self.with_bucket("GetBucketTagging", name, |b| b.tags.clone())
            })
            .await
    }

    async fn put_bucket_tags(&self, ctx: &CallContext, name: &str, tags: &[Tag]) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "PutBucketTagging", async {
                self.with_bucket("PutBucketTagging", name, |b| b.tags = tags.to_vec())
            })
            .await
    }

    async fn put_website_config(
        &self,
        ctx: &CallContext,
        name: &str,
        config: &WebsiteConfiguration,
    ) -> ApiResult<()> {
        let mut stored = config.clone();
        stored.index_document = Some(IndexDocument {
            suffix: config.index_suffix().to_owned(),
        });
        self.harness
            .call(ctx, SERVICE, "PutBucketWebsite", async {
                self.with_bucket("PutBucketWebsite", name, |b| b.website = Some(stored))
            })
            .await
    }

    async fn put_bucket_policy(
        &self,
        ctx: &CallContext,
        name: &str,
        document: &PolicyDocument,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "PutBucketPolicy", async {
                let rendered = document.render().map_err(|e| {
                    self.harness
                        .error(SERVICE, "PutBucketPolicy", "MalformedPolicy", e.to_string())
                })?;
                self.with_bucket("PutBucketPolicy", name, |b| b.policy = Some(rendered))
            })
            .await
    }

    async fn put_bucket_encryption(
        &self,
        ctx: &CallContext,
        name: &str,
        encryption: &ServerSideEncryption,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "PutBucketEncryption", async {
                self.with_bucket("PutBucketEncryption", name, |b| {
                    b.encryption = Some(encryption.clone());
                })
            })
            .await
    }

    async fn put_bucket_logging(
        &self,
        ctx: &CallContext,
        name: &str,
        log_bucket: &str,
        prefix: Option<&str>,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "PutBucketLogging", async {
                if !self.buckets.contains_key(log_bucket) {
                    return Err(self.harness.error(
                        SERVICE,
                        "PutBucketLogging",
                        "InvalidTargetBucketForLogging",
                        format!("The target bucket for logging does not exist: {log_bucket}"),
                    ));
                }
                let target = LoggingTarget {
                    target_bucket: log_bucket.to_owned(),
                    target_prefix: naming::logging_prefix(name, prefix),
                };
                self.with_bucket("PutBucketLogging", name, |b| b.logging = Some(target))
            })
            .await
    }

    async fn get_bucket_logging(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> ApiResult<Option<LoggingTarget>> {
        self.harness
            .call(ctx, SERVICE, "GetBucketLogging", async {
                self.with_bucket("GetBucketLogging", name, |b| b.logging.clone())
            })
            .await
    }

    async fn list_object_keys(
        &self,
        ctx: &CallContext,
        name: &str,
        max: i32,
    ) -> ApiResult<Vec<String>> {
        let max = usize::try_from(max).unwrap_or(0);
        self.harness
            .call(ctx, SERVICE, "ListObjectsV2", async {
                self.with_bucket("ListObjectsV2", name, |b| {
                    b.objects.keys().take(max).cloned().collect()
                })
            })
            .await
    }

    async fn put_object(
        &self,
        ctx: &CallContext,
        name: &str,
        key: &str,
        body: Bytes,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "PutObject", async {
                self.with_bucket("PutObject", name, |b| {
                    b.objects.insert(key.to_owned(), body);
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use s3admin_core::{AccountConfig, ErrorClassifier, ErrorKind};

    use crate::MemoryCloud;

    use super::*;

    fn gateway() -> (MemoryCloud, CallContext) {
        let cloud = MemoryCloud::new(&AccountConfig::builder().build(), ErrorClassifier::default());
        (cloud, CallContext::default())
    }

    #[tokio::test]
    async fn test_should_create_and_detect_bucket() {
        let (cloud, ctx) = gateway();
        let s3 = cloud.object();
        assert!(!s3.bucket_exists(&ctx, "b1").await.unwrap());
        assert_eq!(s3.create_bucket(&ctx, "b1", "us-east-1").await.unwrap(), "/b1");
        assert!(s3.bucket_exists(&ctx, "b1").await.unwrap());

        let err = s3.create_bucket(&ctx, "b1", "us-east-1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.code, "BucketAlreadyOwnedByYou");
    }

    #[tokio::test]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let (cloud, ctx) = gateway();
        let s3 = cloud.object();
        s3.create_bucket(&ctx, "b1", "us-east-1").await.unwrap();
        s3.put_object(&ctx, "b1", "a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap();

        let err = s3.delete_empty_bucket(&ctx, "b1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(s3.contains("b1"));
    }

    #[tokio::test]
    async fn test_should_ignore_folder_placeholders_when_filtering() {
        let (cloud, ctx) = gateway();
        let s3 = cloud.object();
        s3.create_bucket(&ctx, "b1", "us-east-1").await.unwrap();
        s3.put_object(&ctx, "b1", "folder/", Bytes::new()).await.unwrap();

        assert!(!s3.bucket_empty(&ctx, "b1").await.unwrap());
        let filter = |k: &str| !k.ends_with('/');
        assert!(
            s3.bucket_empty_with_filter(&ctx, "b1", 100, &filter)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_should_canonicalize_logging_prefix() {
        let (cloud, ctx) = gateway();
        let s3 = cloud.object();
        s3.create_bucket(&ctx, "logs", "us-east-1").await.unwrap();
        s3.create_bucket(&ctx, "b1", "us-east-1").await.unwrap();
        s3.put_bucket_logging(&ctx, "b1", "logs", Some("/s3/"))
            .await
            .unwrap();
        let target = s3.get_bucket_logging(&ctx, "b1").await.unwrap().unwrap();
        assert_eq!(target.target_prefix, "s3/b1/");
    }

    #[tokio::test]
    async fn test_should_inject_index_document() {
        let (cloud, ctx) = gateway();
        let s3 = cloud.object();
        s3.create_bucket(&ctx, "b1", "us-east-1").await.unwrap();
        s3.put_website_config(&ctx, "b1", &WebsiteConfiguration::default())
            .await
            .unwrap();
        assert_eq!(s3.website("b1").unwrap().index_suffix(), "index.html");
        assert_eq!(
            s3.website("b1")
                .unwrap()
                .index_document
                .map(|d| d.suffix)
                .as_deref(),
            Some("index.html")
        );
    }

    #[tokio::test]
    async fn test_should_fail_next_call_with_injected_code() {
        let (cloud, ctx) = gateway();
        cloud.fail_next("CreateBucket", "TooManyBuckets");
        let err = cloud
            .object()
            .create_bucket(&ctx, "b1", "us-east-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::LimitExceeded);
        assert!(!cloud.object().contains("b1"));
        assert!(
            cloud
                .object()
                .create_bucket(&ctx, "b1", "us-east-1")
                .await
                .is_ok()
        );
        assert_eq!(cloud.journal(), vec!["CreateBucket", "CreateBucket"]);
    }
}
