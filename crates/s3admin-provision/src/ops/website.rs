//! Website workflows.
//!
//! A website is a bucket with static hosting and a public-read policy,
//! served by a distribution aliased to the bucket name, with an `A` alias
//! record in the hosted zone of the name's parent domain.
//!
//! Distributions deploy asynchronously. Website-Delete disables the
//! distribution and tries to delete it right away; when the provider is not
//! done disabling, the output is marked pending and the caller repeats the
//! delete later. The repeated delete tolerates the bucket, group and record
//! being gone as long as a distribution still answers for the name.

use std::sync::Arc;
use std::time::Duration;

use s3admin_core::{ApiError, ApiResult, CallContext, DomainRegistration, ErrorKind};
use s3admin_model::input::{CreateBucketInput, PatchWebsiteInput, UpdateTagsInput};
use s3admin_model::output::{
    CreateBucketOutput, DeleteBucketOutput, InvalidationOutput, ListWebsitesOutput,
    ShowBucketOutput, UpdateTagsOutput,
};
use s3admin_gateway::CdnGateway;
use s3admin_model::{Distribution, DistributionConfig, RecordSet};
use tracing::{debug, info};

use crate::provisioner::{Provisioner, cleanup_error, optional, require_name};
use crate::saga::{self, CLEANUP_PENDING, Saga};

const ALIAS_RECORD_TYPE: &str = "A";

/// Pause between status checks of a distribution being disabled.
const DISABLE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Undo a distribution created by Website-Create: disable it, wait for the
/// disabled configuration to deploy, then delete it. Running out of time
/// while it deploys yields a [`CLEANUP_PENDING`] error.
async fn remove_created_distribution(
    cdn: &dyn CdnGateway,
    ctx: &CallContext,
    id: &str,
) -> ApiResult<()> {
    let mut current = cdn.disable_distribution(ctx, id).await?;
    while !current.is_fully_disabled() {
        if ctx.remaining() <= DISABLE_POLL_INTERVAL {
            return Err(ApiError::conflict(format!(
                "distribution {id} is disabled but still deploying; delete it once deployed"
            ))
            .with_code(CLEANUP_PENDING));
        }
        debug!(id, status = %current.status, "waiting for distribution to deploy");
        tokio::time::sleep(DISABLE_POLL_INTERVAL).await;
        current = cdn.get_distribution(ctx, id).await?;
    }
    cdn.delete_distribution(ctx, id).await
}

impl Provisioner {
    fn registration(&self, name: &str) -> ApiResult<DomainRegistration> {
        self.gateways
            .cdn
            .website_defaults()
            .registration(name)
            .cloned()
    }

    /// Distributions aliased to one of the account's domains.
    pub async fn list_websites(&self, ctx: &CallContext) -> ApiResult<ListWebsitesOutput> {
        let account = Arc::clone(&self.account);
        let distributions = self
            .gateways
            .cdn
            .list_distributions_with_filter(ctx, &move |d: &Distribution| {
                d.aliases.iter().any(|alias| account.owns_alias(alias))
            })
            .await?;
        Ok(ListWebsitesOutput { distributions })
    }

    /// The bucket view plus the website's distribution, its tags and its
    /// alias record, when they exist.
    pub async fn show_website(&self, ctx: &CallContext, name: &str) -> ApiResult<ShowBucketOutput> {
        let registration = self.registration(name)?;
        let cdn = &self.gateways.cdn;

        let mut out = self.show_bucket(ctx, name).await?;
        if let Some(distribution) = optional(cdn.get_distribution_by_name(ctx, name).await)? {
            out.distribution_tags = Some(cdn.list_tags(ctx, &distribution.arn).await?);
            out.distribution = Some(distribution);
        }
        out.dns_record = optional(
            self.gateways
                .dns
                .get_record(ctx, &registration.hosted_zone_id, name, ALIAS_RECORD_TYPE)
                .await,
        )?;
        Ok(out)
    }

    /// Replace the bucket's tags and merge them into the distribution's.
    pub async fn update_website_tags(
        &self,
        ctx: &CallContext,
        name: &str,
        input: UpdateTagsInput,
    ) -> ApiResult<UpdateTagsOutput> {
        let mut out = self.update_bucket_tags(ctx, name, input).await?;
        let cdn = &self.gateways.cdn;
        if let Some(distribution) = optional(cdn.get_distribution_by_name(ctx, name).await)? {
            cdn.tag_distribution(ctx, &distribution.arn, &out.tags)
                .await?;
            out.distribution_id = Some(distribution.id);
        }
        Ok(out)
    }

    /// Invalidate cached paths of the website's distribution.
    pub async fn patch_website(
        &self,
        ctx: &CallContext,
        name: &str,
        input: PatchWebsiteInput,
    ) -> ApiResult<InvalidationOutput> {
        let paths = input
            .cache_invalidation
            .filter(|paths| !paths.is_empty())
            .ok_or_else(|| {
                ApiError::bad_request("CacheInvalidation must list at least one path")
                    .with_code("MissingCacheInvalidation")
            })?;
        let cdn = &self.gateways.cdn;
        let distribution = cdn.get_distribution_by_name(ctx, name).await?;
        let invalidation = cdn.invalidate_cache(ctx, &distribution.id, &paths).await?;
        info!(account = %self.name, website = name, id = %invalidation.id, "cache invalidated");
        Ok(InvalidationOutput {
            distribution_id: distribution.id,
            invalidation,
        })
    }

    /// Website-Create: the bucket steps with website hosting, then the
    /// distribution and its alias record. The parent domain is checked
    /// before any cloud call.
    pub async fn create_website(
        &self,
        ctx: &CallContext,
        input: CreateBucketInput,
    ) -> ApiResult<CreateBucketOutput> {
        let name = input.bucket_input.bucket.as_str();
        require_name("website name", "InvalidBucketName", name)?;
        let registration = self.registration(name)?;
        let config = self
            .gateways
            .cdn
            .default_website_distribution_config(name)?;

        let mut saga = self.saga("website-create");
        let outcome = saga::catch(self.create_website_steps(
            ctx,
            &mut saga,
            &input,
            &registration,
            config,
        ))
        .await;
        saga.settle(ctx, outcome).await
    }

    async fn create_website_steps(
        &self,
        ctx: &CallContext,
        saga: &mut Saga,
        input: &CreateBucketInput,
        registration: &DomainRegistration,
        config: DistributionConfig,
    ) -> ApiResult<CreateBucketOutput> {
        let name = input.bucket_input.bucket.as_str();
        let mut out = self.create_bucket_steps(ctx, saga, input, true).await?;

        let cdn = Arc::clone(&self.gateways.cdn);
        let distribution = cdn.create_distribution(ctx, &config, &input.tags).await?;
        {
            let cdn = Arc::clone(&cdn);
            let id = distribution.id.clone();
            saga.push(format!("delete distribution {id}"), move |ctx| async move {
                remove_created_distribution(cdn.as_ref(), &ctx, &id).await
            });
        }

        let dns = Arc::clone(&self.gateways.dns);
        let zone = registration.hosted_zone_id.clone();
        let record = RecordSet::cloudfront_alias(name, &distribution.domain_name);
        let change = dns.create_record(ctx, &zone, &record).await?;
        {
            let dns = Arc::clone(&dns);
            let label = format!("delete record {}", record.name);
            saga.push(label, move |ctx| async move {
                dns.delete_record(&ctx, &zone, &record).await.map(|_| ())
            });
        }

        info!(
            account = %self.name,
            website = name,
            distribution = %distribution.id,
            domain = %distribution.domain_name,
            "website provisioned"
        );
        out.distribution = Some(distribution);
        out.dns_change = Some(change);
        Ok(out)
    }

    /// Website-Delete: bucket, admin group, alias record, then distribution.
    /// `distribution_pending` is set when the distribution could not be
    /// deleted yet because its disabled configuration is still deploying.
    pub async fn delete_website(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> ApiResult<DeleteBucketOutput> {
        require_name("website name", "InvalidBucketName", name)?;
        let registration = self.registration(name)?;
        let cdn = &self.gateways.cdn;

        let mut retry = false;
        match self.gateways.object.delete_empty_bucket(ctx, name).await {
            Ok(()) => info!(account = %self.name, website = name, "website bucket deleted"),
            Err(err) if err.is_not_found() => {
                if optional(cdn.get_distribution_by_name(ctx, name).await)?.is_none() {
                    return Err(err);
                }
                debug!(website = name, "bucket already removed, resuming delete");
                retry = true;
            }
            Err(err) => return Err(err),
        }

        let mut out = DeleteBucketOutput {
            bucket: name.to_owned(),
            ..DeleteBucketOutput::default()
        };
        self.remove_admin_group(ctx, name, &mut out, retry).await;
        self.remove_alias_record(ctx, name, &registration, &mut out)
            .await;

        match optional(cdn.get_distribution_by_name(ctx, name).await) {
            Ok(Some(distribution)) => self.remove_distribution(ctx, distribution, &mut out).await,
            Ok(None) => debug!(website = name, "no distribution to remove"),
            Err(err) => out.errors.push(cleanup_error("ListDistributions", &err)),
        }
        Ok(out)
    }

    async fn remove_alias_record(
        &self,
        ctx: &CallContext,
        name: &str,
        registration: &DomainRegistration,
        out: &mut DeleteBucketOutput,
    ) {
        let dns = &self.gateways.dns;
        let zone = registration.hosted_zone_id.as_str();
        match optional(dns.get_record(ctx, zone, name, ALIAS_RECORD_TYPE).await) {
            Ok(Some(record)) => match dns.delete_record(ctx, zone, &record).await {
                Ok(change) => {
                    info!(website = name, change = %change.id, "alias record deleted");
                    out.dns_record = Some(record);
                }
                Err(err) => out.errors.push(cleanup_error("DeleteRecord", &err)),
            },
            Ok(None) => debug!(website = name, "no alias record to remove"),
            Err(err) => out
                .errors
                .push(cleanup_error("ListResourceRecordSets", &err)),
        }
    }

    async fn remove_distribution(
        &self,
        ctx: &CallContext,
        distribution: Distribution,
        out: &mut DeleteBucketOutput,
    ) {
        let cdn = &self.gateways.cdn;
        let disabled = match cdn.disable_distribution(ctx, &distribution.id).await {
            Ok(disabled) => disabled,
            Err(err) => {
                out.errors.push(cleanup_error("UpdateDistribution", &err));
                out.distribution = Some(distribution);
                return;
            }
        };

        match cdn.delete_distribution(ctx, &disabled.id).await {
            Ok(()) => info!(id = %disabled.id, "distribution deleted"),
            Err(err) if err.kind == ErrorKind::Conflict => {
                info!(id = %disabled.id, status = %disabled.status, "distribution still deploying");
                out.distribution_pending = true;
            }
            Err(err) => out.errors.push(cleanup_error("DeleteDistribution", &err)),
        }
        out.distribution = Some(disabled);
    }
}
