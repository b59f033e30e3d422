//! Default distribution configuration for website buckets.

use std::collections::HashMap;

use s3admin_core::{AccountConfig, ApiError, ApiResult, DomainRegistration, naming};
use s3admin_model::{DEFAULT_INDEX_DOCUMENT, DistributionConfig, ViewerCertificate, WebsiteOrigin};

/// Managed "CachingOptimized" cache policy.
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// Account settings website distributions are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteDefaults {
    /// Region the website buckets live in.
    pub region: String,
    /// Parent domains with their certificate and hosted zone.
    pub domains: HashMap<String, DomainRegistration>,
}

impl WebsiteDefaults {
    /// Take the region and domains of an account.
    #[must_use]
    pub fn from_account(account: &AccountConfig) -> Self {
        Self {
            region: account.region.clone(),
            domains: account.domains.clone(),
        }
    }

    /// Registration of the parent domain of `name`.
    pub fn registration(&self, name: &str) -> ApiResult<&DomainRegistration> {
        naming::parent_domain(name)
            .and_then(|parent| self.domains.get(parent))
            .ok_or_else(|| {
                ApiError::bad_request(format!("{name} is not under a configured domain"))
                    .with_code("InvalidDomain")
            })
    }
}

/// Website endpoint of a bucket.
#[must_use]
pub fn website_endpoint(name: &str, region: &str) -> String {
    format!("{name}.s3-website-{region}.amazonaws.com")
}

/// Build the distribution serving website bucket `name`.
///
/// The only alias is `name`; the origin is the bucket's website endpoint over
/// plain HTTP; the certificate is the one registered for the parent domain.
pub fn website_distribution_config(
    defaults: &WebsiteDefaults,
    name: &str,
) -> ApiResult<DistributionConfig> {
    let registration = defaults.registration(name)?;
    let origin_domain = website_endpoint(name, &defaults.region);

    Ok(DistributionConfig {
        caller_reference: format!("{name}-{}", uuid::Uuid::new_v4()),
        aliases: vec![name.to_owned()],
        comment: name.to_owned(),
        enabled: true,
        default_root_object: DEFAULT_INDEX_DOCUMENT.to_owned(),
        origin: WebsiteOrigin {
            id: format!("S3-Website-{origin_domain}"),
            domain_name: origin_domain,
            http_port: 80,
            https_port: 443,
            protocol_policy: "http-only".to_owned(),
        },
        viewer_protocol_policy: "redirect-to-https".to_owned(),
        cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.to_owned(),
        compress: true,
        http_version: "http2".to_owned(),
        ipv6_enabled: true,
        price_class: "PriceClass_100".to_owned(),
        viewer_certificate: ViewerCertificate {
            acm_certificate_arn: registration.cert_arn.clone(),
            ssl_support_method: "sni-only".to_owned(),
            minimum_protocol_version: "TLSv1.2_2021".to_owned(),
        },
    })
}
