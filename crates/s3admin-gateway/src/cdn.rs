//! Content distribution gateway.

use std::fmt;

use async_trait::async_trait;
use s3admin_core::{ApiError, ApiResult, CallContext};
use s3admin_model::{Distribution, DistributionConfig, Invalidation, Tag};

use crate::distribution::{self, WebsiteDefaults};

/// Distribution predicate used by [`CdnGateway::list_distributions_with_filter`].
pub type DistributionFilter<'a> = &'a (dyn Fn(&Distribution) -> bool + Send + Sync);

/// Distribution operations of the CDN.
///
/// Mutations of an existing distribution fetch its current version tag and
/// send it back unchanged, so a concurrent change makes them fail.
#[async_trait]
pub trait CdnGateway: Send + Sync + fmt::Debug {
    /// Create a distribution carrying `tags`.
    async fn create_distribution(
        &self,
        ctx: &CallContext,
        config: &DistributionConfig,
        tags: &[Tag],
    ) -> ApiResult<Distribution>;

    /// Fetch a distribution.
    async fn get_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<Distribution>;

    /// Stop serving traffic. Already disabled distributions are returned as is.
    async fn disable_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<Distribution>;

    /// Delete a distribution. The provider rejects this until the disabled
    /// configuration is fully deployed.
    async fn delete_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<()>;

    /// Add or overwrite tags on a distribution.
    async fn tag_distribution(&self, ctx: &CallContext, arn: &str, tags: &[Tag])
    -> ApiResult<()>;

    /// All distributions of the account.
    async fn list_distributions(&self, ctx: &CallContext) -> ApiResult<Vec<Distribution>>;

    /// Invalidate cached `paths`.
    async fn invalidate_cache(
        &self,
        ctx: &CallContext,
        id: &str,
        paths: &[String],
    ) -> ApiResult<Invalidation>;

    /// Tags of a distribution.
    async fn list_tags(&self, ctx: &CallContext, arn: &str) -> ApiResult<Vec<Tag>>;

    /// Region and domains website distributions are built from.
    fn website_defaults(&self) -> &WebsiteDefaults;

    /// Distributions satisfying `predicate`.
    async fn list_distributions_with_filter(
        &self,
        ctx: &CallContext,
        predicate: DistributionFilter<'_>,
    ) -> ApiResult<Vec<Distribution>> {
        let all = self.list_distributions(ctx).await?;
        Ok(all.into_iter().filter(|d| predicate(d)).collect())
    }

    /// The distribution aliased to `alias`, or `NotFound`.
    async fn get_distribution_by_name(
        &self,
        ctx: &CallContext,
        alias: &str,
    ) -> ApiResult<Distribution> {
        self.list_distributions_with_filter(ctx, &|d: &Distribution| d.has_alias(alias))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::not_found(format!("no distribution has alias {alias}"))
                    .with_code("NoSuchDistribution")
            })
    }

    /// Distribution configuration serving the website bucket `name`.
    fn default_website_distribution_config(&self, name: &str) -> ApiResult<DistributionConfig> {
        distribution::website_distribution_config(self.website_defaults(), name)
    }
}
