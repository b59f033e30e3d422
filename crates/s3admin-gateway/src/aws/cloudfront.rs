//! CloudFront gateway.

use async_trait::async_trait;
use aws_sdk_cloudfront::Client;
use aws_sdk_cloudfront::types as cf;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService, ErrorClassifier};
use s3admin_model::{Distribution, DistributionConfig, Invalidation, Tag};
use tracing::debug;

use super::{build_error, sdk_error, to_chrono};
use crate::cdn::CdnGateway;
use crate::distribution::WebsiteDefaults;

/// [`CdnGateway`] over the CloudFront API.
#[derive(Debug, Clone)]
pub struct AwsCdnGateway {
    client: Client,
    classifier: ErrorClassifier,
    defaults: WebsiteDefaults,
}

impl AwsCdnGateway {
    /// Wrap a CloudFront client.
    #[must_use]
    pub fn new(client: Client, classifier: ErrorClassifier, defaults: WebsiteDefaults) -> Self {
        Self {
            client,
            classifier,
            defaults,
        }
    }

    fn error<E>(&self, context: &str, err: SdkError<E, HttpResponse>) -> ApiError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        sdk_error(&self.classifier, CloudService::Cdn, context, err)
    }

    async fn fetch(&self, context: &str, id: &str) -> ApiResult<(Distribution, Option<String>)> {
        let out = self
            .client
            .get_distribution()
            .id(id)
            .send()
            .await
            .map_err(|e| self.error(context, e))?;
        let distribution = out
            .distribution()
            .map(convert_distribution)
            .ok_or_else(|| missing(context, "distribution"))?;
        Ok((distribution, out.e_tag().map(str::to_owned)))
    }
}

fn missing(context: &str, what: &str) -> ApiError {
    ApiError::internal(format!("{context}: response has no {what}"))
}

fn aliases_of(aliases: Option<&cf::Aliases>) -> Vec<String> {
    aliases.map(|a| a.items().to_vec()).unwrap_or_default()
}

fn convert_distribution(d: &cf::Distribution) -> Distribution {
    let config = d.distribution_config();
    Distribution {
        id: d.id().to_owned(),
        arn: d.arn().to_owned(),
        domain_name: d.domain_name().to_owned(),
        status: d.status().to_owned(),
        enabled: config.is_some_and(cf::DistributionConfig::enabled),
        aliases: aliases_of(config.and_then(cf::DistributionConfig::aliases)),
        last_modified_time: to_chrono(d.last_modified_time()),
    }
}

fn convert_summary(d: &cf::DistributionSummary) -> Distribution {
    Distribution {
        id: d.id().to_owned(),
        arn: d.arn().to_owned(),
        domain_name: d.domain_name().to_owned(),
        status: d.status().to_owned(),
        enabled: d.enabled(),
        aliases: aliases_of(d.aliases()),
        last_modified_time: to_chrono(d.last_modified_time()),
    }
}

fn build_tags(context: &str, tags: &[Tag]) -> ApiResult<cf::Tags> {
    let items = tags
        .iter()
        .map(|t| cf::Tag::builder().key(&t.key).value(&t.value).build())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| build_error(context, e))?;
    Ok(cf::Tags::builder().set_items(Some(items)).build())
}

fn build_distribution_config(config: &DistributionConfig) -> ApiResult<cf::DistributionConfig> {
    const CONTEXT: &str = "CreateDistribution";
    let err = |e| build_error(CONTEXT, e);

    let aliases = cf::Aliases::builder()
        .quantity(i32::try_from(config.aliases.len()).unwrap_or(i32::MAX))
        .set_items(Some(config.aliases.clone()))
        .build()
        .map_err(err)?;
    let custom_origin = cf::CustomOriginConfig::builder()
        .http_port(config.origin.http_port)
        .https_port(config.origin.https_port)
        .origin_protocol_policy(cf::OriginProtocolPolicy::from(
            config.origin.protocol_policy.as_str(),
        ))
        .build()
        .map_err(err)?;
    let origin = cf::Origin::builder()
        .id(&config.origin.id)
        .domain_name(&config.origin.domain_name)
        .custom_origin_config(custom_origin)
        .build()
        .map_err(err)?;
    let origins = cf::Origins::builder()
        .quantity(1)
        .items(origin)
        .build()
        .map_err(err)?;
    let behavior = cf::DefaultCacheBehavior::builder()
        .target_origin_id(&config.origin.id)
        .viewer_protocol_policy(cf::ViewerProtocolPolicy::from(
            config.viewer_protocol_policy.as_str(),
        ))
        .cache_policy_id(&config.cache_policy_id)
        .compress(config.compress)
        .build()
        .map_err(err)?;
    let certificate = cf::ViewerCertificate::builder()
        .acm_certificate_arn(&config.viewer_certificate.acm_certificate_arn)
        .ssl_support_method(cf::SslSupportMethod::from(
            config.viewer_certificate.ssl_support_method.as_str(),
        ))
        .minimum_protocol_version(cf::MinimumProtocolVersion::from(
            config.viewer_certificate.minimum_protocol_version.as_str(),
        ))
        .build();

    cf::DistributionConfig::builder()
        .caller_reference(&config.caller_reference)
        .aliases(aliases)
        .default_root_object(&config.default_root_object)
        .origins(origins)
        .default_cache_behavior(behavior)
        .comment(&config.comment)
        .enabled(config.enabled)
        .http_version(cf::HttpVersion::from(config.http_version.as_str()))
        .is_ipv6_enabled(config.ipv6_enabled)
        .price_class(cf::PriceClass::from(config.price_class.as_str()))
        .viewer_certificate(certificate)
        .build()
        .map_err(err)
}

#[async_trait]
impl CdnGateway for AwsCdnGateway {
    async fn create_distribution(
        &self,
        ctx: &CallContext,
        config: &DistributionConfig,
        tags: &[Tag],
    ) -> ApiResult<Distribution> {
        let with_tags = cf::DistributionConfigWithTags::builder()
            .distribution_config(build_distribution_config(config)?)
            .tags(build_tags("CreateDistributionWithTags", tags)?)
            .build();
        ctx.run("CreateDistributionWithTags", async {
            let out = self
                .client
                .create_distribution_with_tags()
                .distribution_config_with_tags(with_tags)
                .send()
                .await
                .map_err(|e| self.error("CreateDistributionWithTags", e))?;
            out.distribution()
                .map(convert_distribution)
                .ok_or_else(|| missing("CreateDistributionWithTags", "distribution"))
        })
        .await
    }

    async fn get_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<Distribution> {
        ctx.run("GetDistribution", async {
            self.fetch("GetDistribution", id).await.map(|(d, _)| d)
        })
        .await
    }

    async fn disable_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<Distribution> {
        ctx.run("UpdateDistribution", async {
            let out = self
                .client
                .get_distribution_config()
                .id(id)
                .send()
                .await
                .map_err(|e| self.error("GetDistributionConfig", e))?;
            let etag = out
                .e_tag()
                .ok_or_else(|| missing("GetDistributionConfig", "ETag"))?
                .to_owned();
            let mut config = out
                .distribution_config
                .ok_or_else(|| missing("GetDistributionConfig", "configuration"))?;

            if !config.enabled {
                debug!(id, "distribution already disabled");
                return self.fetch("GetDistribution", id).await.map(|(d, _)| d);
            }
            config.enabled = false;

            let out = self
                .client
                .update_distribution()
                .id(id)
                .if_match(etag)
                .distribution_config(config)
                .send()
                .await
                .map_err(|e| self.error("UpdateDistribution", e))?;
            out.distribution()
                .map(convert_distribution)
                .ok_or_else(|| missing("UpdateDistribution", "distribution"))
        })
        .await
    }

    async fn delete_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<()> {
        ctx.run("DeleteDistribution", async {
            let (_, etag) = self.fetch("GetDistribution", id).await?;
            let etag = etag.ok_or_else(|| missing("GetDistribution", "ETag"))?;
            self.client
                .delete_distribution()
                .id(id)
                .if_match(etag)
                .send()
                .await
                .map_err(|e| self.error("DeleteDistribution", e))?;
            Ok(())
        })
        .await
    }

    async fn tag_distribution(&self, ctx: &CallContext, arn: &str, tags: &[Tag]) -> ApiResult<()> {
        let tags = build_tags("TagResource", tags)?;
        ctx.run("TagResource", async {
            self.client
                .tag_resource()
                .resource(arn)
                .tags(tags)
                .send()
                .await
                .map_err(|e| self.error("TagResource", e))?;
            Ok(())
        })
        .await
    }

    async fn list_distributions(&self, ctx: &CallContext) -> ApiResult<Vec<Distribution>> {
        ctx.run("ListDistributions", async {
            let mut distributions = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let out = self
                    .client
                    .list_distributions()
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| self.error("ListDistributions", e))?;
                let Some(list) = out.distribution_list() else {
                    break;
                };
                distributions.extend(list.items().iter().map(convert_summary));
                match list.next_marker() {
                    Some(next) if list.is_truncated() => marker = Some(next.to_owned()),
                    _ => break,
                }
            }
            Ok(distributions)
        })
        .await
    }

    async fn invalidate_cache(
        &self,
        ctx: &CallContext,
        id: &str,
        paths: &[String],
    ) -> ApiResult<Invalidation> {
        let batch = cf::Paths::builder()
            .quantity(i32::try_from(paths.len()).unwrap_or(i32::MAX))
            .set_items(Some(paths.to_vec()))
            .build()
            .and_then(|p| {
                cf::InvalidationBatch::builder()
                    .paths(p)
                    .caller_reference(uuid::Uuid::new_v4().to_string())
                    .build()
            })
            .map_err(|e| build_error("CreateInvalidation", e))?;
        ctx.run("CreateInvalidation", async {
            let out = self
                .client
                .create_invalidation()
                .distribution_id(id)
                .invalidation_batch(batch)
                .send()
                .await
                .map_err(|e| self.error("CreateInvalidation", e))?;
            let invalidation = out
                .invalidation()
                .ok_or_else(|| missing("CreateInvalidation", "invalidation"))?;
            Ok(Invalidation {
                id: invalidation.id().to_owned(),
                status: invalidation.status().to_owned(),
                create_time: to_chrono(invalidation.create_time()),
                paths: invalidation
                    .invalidation_batch()
                    .and_then(cf::InvalidationBatch::paths)
                    .map(|p| p.items().to_vec())
                    .unwrap_or_default(),
            })
        })
        .await
    }

    async fn list_tags(&self, ctx: &CallContext, arn: &str) -> ApiResult<Vec<Tag>> {
        ctx.run("ListTagsForResource", async {
            let out = self
                .client
                .list_tags_for_resource()
                .resource(arn)
                .send()
                .await
                .map_err(|e| self.error("ListTagsForResource", e))?;
            Ok(out
                .tags()
                .map(|t| {
                    t.items()
                        .iter()
                        .map(|tag| Tag::new(tag.key(), tag.value().unwrap_or_default()))
                        .collect()
                })
                .unwrap_or_default())
        })
        .await
    }

    fn website_defaults(&self) -> &WebsiteDefaults {
        &self.defaults
    }
}
