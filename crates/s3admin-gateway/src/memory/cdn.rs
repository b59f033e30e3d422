//! In-memory content distribution.
//!
//! Configuration changes leave a distribution `InProgress` until it is
//! deployed. With auto-deploy on (the default) every change deploys at once;
//! tests that need the provider's propagation delay turn it off and call
//! [`MemoryCdnGateway::deploy_all`] when they want it to settle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService};
use s3admin_model::{Distribution, DistributionConfig, Invalidation, Tag};
use tracing::info;

use super::{Harness, MEMORY_ACCOUNT_ID};
use crate::cdn::CdnGateway;
use crate::distribution::WebsiteDefaults;

const SERVICE: CloudService = CloudService::Cdn;

const DEPLOYED: &str = "Deployed";
const IN_PROGRESS: &str = "InProgress";

#[derive(Debug, Clone)]
struct MemoryDistribution {
    distribution: Distribution,
    config: DistributionConfig,
    etag: u64,
    tags: Vec<Tag>,
    invalidations: Vec<Invalidation>,
}

/// [`CdnGateway`] backed by a concurrent map of distributions.
#[derive(Debug)]
pub struct MemoryCdnGateway {
    harness: Arc<Harness>,
    defaults: WebsiteDefaults,
    distributions: DashMap<String, MemoryDistribution>,
    auto_deploy: AtomicBool,
}

fn merge_tags(existing: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        match existing.iter_mut().find(|t| t.key == tag.key) {
            Some(current) => current.value.clone_from(&tag.value),
            None => existing.push(tag.clone()),
        }
    }
}

impl MemoryCdnGateway {
    pub(crate) fn new(harness: Arc<Harness>, defaults: WebsiteDefaults) -> Self {
        Self {
            harness,
            defaults,
            distributions: DashMap::new(),
            auto_deploy: AtomicBool::new(true),
        }
    }

    fn no_such_distribution(&self, operation: &str, id: &str) -> ApiError {
        self.harness.error(
            SERVICE,
            operation,
            "NoSuchDistribution",
            format!("The specified distribution does not exist: {id}"),
        )
    }

    fn settled_status(&self) -> &'static str {
        if self.auto_deploy.load(Ordering::Relaxed) {
            DEPLOYED
        } else {
            IN_PROGRESS
        }
    }

    fn id_for_arn(&self, operation: &str, arn: &str) -> ApiResult<String> {
        self.distributions
            .iter()
            .find(|entry| entry.distribution.arn == arn)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| {
                self.harness.error(
                    SERVICE,
                    operation,
                    "NoSuchResource",
                    format!("The specified resource does not exist: {arn}"),
                )
            })
    }

    /// Deploy changes immediately (`true`) or leave them `InProgress` until
    /// [`Self::deploy_all`].
    pub fn set_auto_deploy(&self, enabled: bool) {
        self.auto_deploy.store(enabled, Ordering::Relaxed);
    }

    /// Finish deploying every pending change.
    pub fn deploy_all(&self) {
        for mut entry in self.distributions.iter_mut() {
            entry.distribution.status = DEPLOYED.to_owned();
        }
    }

    /// Tags stored on a distribution.
    #[must_use]
    pub fn tags(&self, id: &str) -> Vec<Tag> {
        self.distributions
            .get(id)
            .map(|d| d.tags.clone())
            .unwrap_or_default()
    }

    /// The stored configuration of a distribution.
    #[must_use]
    pub fn config(&self, id: &str) -> Option<DistributionConfig> {
        self.distributions.get(id).map(|d| d.config.clone())
    }

    /// Invalidations created for a distribution, oldest first.
    #[must_use]
    pub fn invalidations(&self, id: &str) -> Vec<Invalidation> {
        self.distributions
            .get(id)
            .map(|d| d.invalidations.clone())
            .unwrap_or_default()
    }

    /// Number of distributions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    /// Whether there are no distributions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }
}

#[async_trait]
impl CdnGateway for MemoryCdnGateway {
    async fn create_distribution(
        &self,
        ctx: &CallContext,
        config: &DistributionConfig,
        tags: &[Tag],
    ) -> ApiResult<Distribution> {
        self.harness
            .call(ctx, SERVICE, "CreateDistributionWithTags", async {
                let taken = self.distributions.iter().find(|entry| {
                    config
                        .aliases
                        .iter()
                        .any(|alias| entry.distribution.has_alias(alias))
                });
                if let Some(entry) = taken {
                    let id = entry.key().clone();
                    drop(entry);
                    return Err(self.harness.error(
                        SERVICE,
                        "CreateDistributionWithTags",
                        "CNAMEAlreadyExists",
                        format!(
                            "One or more of the CNAMEs are already associated with distribution {id}"
                        ),
                    ));
                }

                let seq = self.harness.next_id();
                let id = format!("E{seq:013X}");
                let distribution = Distribution {
                    arn: format!("arn:aws:cloudfront::{MEMORY_ACCOUNT_ID}:distribution/{id}"),
                    domain_name: format!("d{seq:012x}.cloudfront.net"),
                    status: self.settled_status().to_owned(),
                    enabled: config.enabled,
                    aliases: config.aliases.clone(),
                    last_modified_time: Some(Utc::now()),
                    id: id.clone(),
                };
                self.distributions.insert(
                    id.clone(),
                    MemoryDistribution {
                        distribution: distribution.clone(),
                        config: config.clone(),
                        etag: 1,
                        tags: tags.to_vec(),
                        invalidations: Vec::new(),
                    },
                );
                info!(%id, aliases = ?config.aliases, "distribution created");
                Ok(distribution)
            })
            .await
    }

    async fn get_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<Distribution> {
        self.harness
            .call(ctx, SERVICE, "GetDistribution", async {
                self.distributions
                    .get(id)
                    .map(|d| d.distribution.clone())
                    .ok_or_else(|| self.no_such_distribution("GetDistribution", id))
            })
            .await
    }

    async fn disable_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<Distribution> {
        self.harness
            .call(ctx, SERVICE, "UpdateDistribution", async {
                let status = self.settled_status();
                let mut entry = self
                    .distributions
                    .get_mut(id)
                    .ok_or_else(|| self.no_such_distribution("UpdateDistribution", id))?;
                if !entry.config.enabled {
                    return Ok(entry.distribution.clone());
                }
                entry.config.enabled = false;
                entry.etag += 1;
                entry.distribution.enabled = false;
                entry.distribution.status = status.to_owned();
                entry.distribution.last_modified_time = Some(Utc::now());
                info!(id, etag = entry.etag, "distribution disabled");
                Ok(entry.distribution.clone())
            })
            .await
    }

    async fn delete_distribution(&self, ctx: &CallContext, id: &str) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DeleteDistribution", async {
                let entry = self
                    .distributions
                    .get(id)
                    .ok_or_else(|| self.no_such_distribution("DeleteDistribution", id))?;
                if !entry.distribution.is_fully_disabled() {
                    drop(entry);
                    return Err(self.harness.error(
                        SERVICE,
                        "DeleteDistribution",
                        "DistributionNotDisabled",
                        format!("The distribution {id} must be disabled and deployed first"),
                    ));
                }
                drop(entry);
                self.distributions.remove(id);
                info!(id, "distribution deleted");
                Ok(())
            })
            .await
    }

    async fn tag_distribution(&self, ctx: &CallContext, arn: &str, tags: &[Tag]) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "TagResource", async {
                let id = self.id_for_arn("TagResource", arn)?;
                let mut entry = self
                    .distributions
                    .get_mut(&id)
                    .ok_or_else(|| self.no_such_distribution("TagResource", &id))?;
                merge_tags(&mut entry.tags, tags);
                Ok(())
            })
            .await
    }

    async fn list_distributions(&self, ctx: &CallContext) -> ApiResult<Vec<Distribution>> {
        self.harness
            .call(ctx, SERVICE, "ListDistributions", async {
                let mut all: Vec<Distribution> = self
                    .distributions
                    .iter()
                    .map(|entry| entry.distribution.clone())
                    .collect();
                all.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(all)
            })
            .await
    }

    async fn invalidate_cache(
        &self,
        ctx: &CallContext,
        id: &str,
        paths: &[String],
    ) -> ApiResult<Invalidation> {
        self.harness
            .call(ctx, SERVICE, "CreateInvalidation", async {
                if paths.is_empty() {
                    return Err(self.harness.error(
                        SERVICE,
                        "CreateInvalidation",
                        "InvalidArgument",
                        "An invalidation needs at least one path",
                    ));
                }
                let mut entry = self
                    .distributions
                    .get_mut(id)
                    .ok_or_else(|| self.no_such_distribution("CreateInvalidation", id))?;
                let invalidation = Invalidation {
                    id: format!("I{:013X}", self.harness.next_id()),
                    status: IN_PROGRESS.to_owned(),
                    create_time: Some(Utc::now()),
                    paths: paths.to_vec(),
                };
                entry.invalidations.push(invalidation.clone());
                info!(id, paths = paths.len(), "invalidation created");
                Ok(invalidation)
            })
            .await
    }

    async fn list_tags(&self, ctx: &CallContext, arn: &str) -> ApiResult<Vec<Tag>> {
        self.harness
            .call(ctx, SERVICE, "ListTagsForResource", async {
                let id = self.id_for_arn("ListTagsForResource", arn)?;
                Ok(self.tags(&id))
            })
            .await
    }

    fn website_defaults(&self) -> &WebsiteDefaults {
        &self.defaults
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use s3admin_core::{AccountConfig, DomainRegistration, ErrorClassifier, ErrorKind};

    use crate::MemoryCloud;

    use super::*;

    fn cloud() -> MemoryCloud {
        let account = AccountConfig::builder()
            .domains(HashMap::from([(
                "example.com".to_owned(),
                DomainRegistration {
                    cert_arn: "arn:aws:acm:us-east-1:000000000000:certificate/abc".to_owned(),
                    hosted_zone_id: "Z1".to_owned(),
                },
            )]))
            .build();
        MemoryCloud::new(&account, ErrorClassifier::default())
    }

    #[tokio::test]
    async fn test_should_reject_duplicate_alias() {
        let cloud = cloud();
        let cdn = cloud.cdn();
        let ctx = CallContext::default();

        let config = cdn
            .default_website_distribution_config("www.example.com")
            .unwrap();
        cdn.create_distribution(&ctx, &config, &[]).await.unwrap();
        let err = cdn
            .create_distribution(&ctx, &config, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.code, "CNAMEAlreadyExists");
    }

    #[tokio::test]
    async fn test_should_require_deployed_disable_before_delete() {
        let cloud = cloud();
        let cdn = cloud.cdn();
        let ctx = CallContext::default();
        cdn.set_auto_deploy(false);

        let config = cdn
            .default_website_distribution_config("www.example.com")
            .unwrap();
        let d = cdn.create_distribution(&ctx, &config, &[]).await.unwrap();

        let err = cdn.delete_distribution(&ctx, &d.id).await.unwrap_err();
        assert_eq!(err.code, "DistributionNotDisabled");

        let disabled = cdn.disable_distribution(&ctx, &d.id).await.unwrap();
        assert!(!disabled.enabled);
        assert_eq!(disabled.status, "InProgress");
        assert!(cdn.delete_distribution(&ctx, &d.id).await.is_err());

        cdn.deploy_all();
        cdn.delete_distribution(&ctx, &d.id).await.unwrap();
        assert!(cdn.is_empty());
    }

    #[tokio::test]
    async fn test_should_find_distribution_by_alias_and_merge_tags() {
        let cloud = cloud();
        let cdn = cloud.cdn();
        let ctx = CallContext::default();

        let config = cdn
            .default_website_distribution_config("www.example.com")
            .unwrap();
        let d = cdn
            .create_distribution(&ctx, &config, &[Tag::new("env", "dev")])
            .await
            .unwrap();
        cdn.tag_distribution(&ctx, &d.arn, &[Tag::new("env", "prod"), Tag::new("team", "web")])
            .await
            .unwrap();

        let found = cdn
            .get_distribution_by_name(&ctx, "WWW.example.com")
            .await
            .unwrap();
        assert_eq!(found.id, d.id);
        let tags = cdn.list_tags(&ctx, &d.arn).await.unwrap();
        assert_eq!(tags, vec![Tag::new("env", "prod"), Tag::new("team", "web")]);

        let err = cdn
            .get_distribution_by_name(&ctx, "other.example.com")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_reject_empty_invalidation() {
        let cloud = cloud();
        let cdn = cloud.cdn();
        let ctx = CallContext::default();

        let config = cdn
            .default_website_distribution_config("www.example.com")
            .unwrap();
        let d = cdn.create_distribution(&ctx, &config, &[]).await.unwrap();
        let err = cdn.invalidate_cache(&ctx, &d.id, &[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);

        let inv = cdn
            .invalidate_cache(&ctx, &d.id, &["/*".to_owned()])
            .await
            .unwrap();
        assert_eq!(inv.paths, vec!["/*".to_owned()]);
        assert_eq!(cdn.invalidations(&d.id).len(), 1);
    }
}
