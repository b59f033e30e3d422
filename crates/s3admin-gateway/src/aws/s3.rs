//! S3 gateway.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types as s3;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use bytes::Bytes;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService, ErrorClassifier, naming};
use s3admin_model::{
    BucketSummary, LoggingTarget, PolicyDocument, ServerSideEncryption, Tag, WebsiteConfiguration,
};

use super::{build_error, sdk_error, to_chrono};
use crate::object::ObjectGateway;

/// [`ObjectGateway`] over the S3 API.
#[derive(Debug, Clone)]
pub struct AwsObjectGateway {
    client: Client,
    classifier: ErrorClassifier,
}

impl AwsObjectGateway {
    /// Wrap an S3 client.
    #[must_use]
    pub fn new(client: Client, classifier: ErrorClassifier) -> Self {
        Self { client, classifier }
    }

    fn error<E>(&self, context: &str, err: SdkError<E, HttpResponse>) -> ApiError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        sdk_error(&self.classifier, CloudService::Object, context, err)
    }
}

#[async_trait]
impl ObjectGateway for AwsObjectGateway {
    async fn bucket_exists(&self, ctx: &CallContext, name: &str) -> ApiResult<bool> {
        ctx.run("HeadBucket", async {
            match self.client.head_bucket().bucket(name).send().await {
                Ok(_) => Ok(true),
                Err(err) => {
                    let err = self.error("HeadBucket", err);
                    if err.is_not_found() {
                        Ok(false)
                    } else {
                        Err(err)
                    }
                }
            }
        })
        .await
    }

    async fn create_bucket(
        &self,
        ctx: &CallContext,
        name: &str,
        region: &str,
    ) -> ApiResult<String> {
        ctx.run("CreateBucket", async {
            let mut request = self.client.create_bucket().bucket(name);
            // us-east-1 rejects an explicit location constraint.
            if region != "us-east-1" {
                request = request.create_bucket_configuration(
                    s3::CreateBucketConfiguration::builder()
                        .location_constraint(s3::BucketLocationConstraint::from(region))
                        .build(),
                );
            }
            let out = request
                .send()
                .await
                .map_err(|e| self.error("CreateBucket", e))?;
            Ok(out
                .location()
                .map_or_else(|| format!("/{name}"), str::to_owned))
        })
        .await
    }

    async fn delete_empty_bucket(&self, ctx: &CallContext, name: &str) -> ApiResult<()> {
        ctx.run("DeleteBucket", async {
            self.client
                .delete_bucket()
                .bucket(name)
                .send()
                .await
                .map_err(|e| self.error("DeleteBucket", e))?;
            Ok(())
        })
        .await
    }

    async fn list_buckets(&self, ctx: &CallContext) -> ApiResult<Vec<BucketSummary>> {
        ctx.run("ListBuckets", async {
            let out = self
                .client
                .list_buckets()
                .send()
                .await
                .map_err(|e| self.error("ListBuckets", e))?;
            Ok(out
                .buckets()
                .iter()
                .filter_map(|b| {
                    Some(BucketSummary {
                        name: b.name()?.to_owned(),
                        creation_date: b.creation_date().and_then(to_chrono),
                    })
                })
                .collect())
        })
        .await
    }

    async fn get_bucket_tags(&self, ctx: &CallContext, name: &str) -> ApiResult<Vec<Tag>> {
        ctx.run("GetBucketTagging", async {
            match self.client.get_bucket_tagging().bucket(name).send().await {
                Ok(out) => Ok(out
                    .tag_set()
                    .iter()
                    .map(|t| Tag::new(t.key(), t.value()))
                    .collect()),
                Err(err) => {
                    let err = self.error("GetBucketTagging", err);
                    if err.code == "NoSuchTagSet" {
                        Ok(Vec::new())
                    } else {
                        Err(err)
                    }
                }
            }
        })
        .await
    }

    async fn put_bucket_tags(&self, ctx: &CallContext, name: &str, tags: &[Tag]) -> ApiResult<()> {
        if tags.is_empty() {
            return ctx
                .run("DeleteBucketTagging", async {
                    self.client
                        .delete_bucket_tagging()
                        .bucket(name)
                        .send()
                        .await
                        .map_err(|e| self.error("DeleteBucketTagging", e))?;
                    Ok(())
                })
                .await;
        }

        ctx.run("PutBucketTagging", async {
            let tag_set = tags
                .iter()
                .map(|t| s3::Tag::builder().key(&t.key).value(&t.value).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| build_error("PutBucketTagging", e))?;
            let tagging = s3::Tagging::builder()
                .set_tag_set(Some(tag_set))
                .build()
                .map_err(|e| build_error("PutBucketTagging", e))?;
            self.client
                .put_bucket_tagging()
                .bucket(name)
                .tagging(tagging)
                .send()
                .await
                .map_err(|e| self.error("PutBucketTagging", e))?;
            Ok(())
        })
        .await
    }

    async fn put_website_config(
        &self,
        ctx: &CallContext,
        name: &str,
        config: &WebsiteConfiguration,
    ) -> ApiResult<()> {
        ctx.run("PutBucketWebsite", async {
            let index = s3::IndexDocument::builder()
                .suffix(config.index_suffix())
                .build()
                .map_err(|e| build_error("PutBucketWebsite", e))?;
            let mut website = s3::WebsiteConfiguration::builder().index_document(index);
            if let Some(key) = config.error_key() {
                let error_document = s3::ErrorDocument::builder()
                    .key(key)
                    .build()
                    .map_err(|e| build_error("PutBucketWebsite", e))?;
                website = website.error_document(error_document);
            }
            self.client
                .put_bucket_website()
                .bucket(name)
                .website_configuration(website.build())
                .send()
                .await
                .map_err(|e| self.error("PutBucketWebsite", e))?;
            Ok(())
        })
        .await
    }

    async fn put_bucket_policy(
        &self,
        ctx: &CallContext,
        name: &str,
        document: &PolicyDocument,
    ) -> ApiResult<()> {
        let policy = document
            .render()
            .map_err(|e| build_error("PutBucketPolicy", e))?;
        ctx.run("PutBucketPolicy", async {
            self.client
                .put_bucket_policy()
                .bucket(name)
                .policy(policy)
                .send()
                .await
                .map_err(|e| self.error("PutBucketPolicy", e))?;
            Ok(())
        })
        .await
    }

    async fn put_bucket_encryption(
        &self,
        ctx: &CallContext,
        name: &str,
        encryption: &ServerSideEncryption,
    ) -> ApiResult<()> {
        ctx.run("PutBucketEncryption", async {
            let default = s3::ServerSideEncryptionByDefault::builder()
                .sse_algorithm(s3::ServerSideEncryption::from(encryption.algorithm.as_str()))
                .set_kms_master_key_id(encryption.kms_key_id.clone())
                .build()
                .map_err(|e| build_error("PutBucketEncryption", e))?;
            let rule = s3::ServerSideEncryptionRule::builder()
                .apply_server_side_encryption_by_default(default)
                .set_bucket_key_enabled(encryption.bucket_key_enabled)
                .build();
            let configuration = s3::ServerSideEncryptionConfiguration::builder()
                .rules(rule)
                .build()
                .map_err(|e| build_error("PutBucketEncryption", e))?;
            self.client
                .put_bucket_encryption()
                .bucket(name)
                .server_side_encryption_configuration(configuration)
                .send()
                .await
                .map_err(|e| self.error("PutBucketEncryption", e))?;
            Ok(())
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
        ctx.run("PutBucketLogging", async {
            let enabled = s3::LoggingEnabled::builder()
                .target_bucket(log_bucket)
                .target_prefix(naming::logging_prefix(name, prefix))
                .build()
                .map_err(|e| build_error("PutBucketLogging", e))?;
            let status = s3::BucketLoggingStatus::builder()
                .logging_enabled(enabled)
                .build();
            self.client
                .put_bucket_logging()
                .bucket(name)
                .bucket_logging_status(status)
                .send()
                .await
                .map_err(|e| self.error("PutBucketLogging", e))?;
            Ok(())
        })
        .await
    }

    async fn get_bucket_logging(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> ApiResult<Option<LoggingTarget>> {
        ctx.run("GetBucketLogging", async {
            let out = self
                .client
                .get_bucket_logging()
                .bucket(name)
                .send()
                .await
                .map_err(|e| self.error("GetBucketLogging", e))?;
            Ok(out.logging_enabled().map(|l| LoggingTarget {
                target_bucket: l.target_bucket().to_owned(),
                target_prefix: l.target_prefix().to_owned(),
            }))
        })
        .await
    }

    async fn list_object_keys(
        &self,
        ctx: &CallContext,
        name: &str,
        max: i32,
    ) -> ApiResult<Vec<String>> {
        ctx.run("ListObjectsV2", async {
            let out = self
                .client
                .list_objects_v2()
                .bucket(name)
                .max_keys(max)
                .send()
                .await
                .map_err(|e| self.error("ListObjectsV2", e))?;
            Ok(out
                .contents()
                .iter()
                .filter_map(|o| o.key().map(str::to_owned))
                .collect())
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
        ctx.run("PutObject", async {
            self.client
                .put_object()
                .bucket(name)
                .key(key)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| self.error("PutObject", e))?;
            Ok(())
        })
        .await
    }
}
