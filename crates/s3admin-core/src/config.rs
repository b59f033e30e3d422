//! Service configuration.
//!
//! Provides [`AppConfig`], loaded from a JSON file and then overridden by a
//! few environment variables. Each entry of `accounts` is an
//! [`AccountConfig`] holding one set of cloud credentials plus the defaults
//! used when rendering policies and distributions for that account.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::naming;

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration is not valid JSON for [`AppConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// No authentication token was configured.
    #[error("token must not be empty")]
    EmptyToken,
    /// No accounts were configured.
    #[error("at least one account must be configured")]
    NoAccounts,
    /// An account has no region.
    #[error("account {0} has no region")]
    MissingRegion(String),
    /// An account uses the AWS backend without credentials.
    #[error("account {0} has no credentials")]
    MissingCredentials(String),
    /// The request timeout is zero.
    #[error("requestTimeoutSecs must be positive")]
    InvalidTimeout,
}

/// Top-level service configuration.
///
/// # Examples
///
/// ```
/// use s3admin_core::config::AppConfig;
///
/// let config = AppConfig::default();
/// assert_eq!(config.listen_address, "0.0.0.0:8080");
/// assert_eq!(config.request_timeout_secs, 15);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Bind address of the HTTP server.
    #[builder(default = String::from("0.0.0.0:8080"))]
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Shared secret expected in `X-Auth-Token`.
    #[builder(default)]
    #[serde(default)]
    pub token: String,

    /// Log level filter string used when `RUST_LOG` is not set.
    #[builder(default = String::from("info"))]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request deadline and header read timeout, in seconds.
    #[builder(default = 15)]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Report CDN `NoSuch…` errors as 400 instead of 404.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub legacy_cdn_not_found: bool,

    /// Accounts by name; the name is the first path segment after `/v1/s3`.
    #[builder(default)]
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            token: String::new(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            legacy_cdn_not_found: true,
            accounts: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load, override from the environment and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document without validating it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `LISTEN_ADDRESS` | `listenAddress` |
    /// | `AUTH_TOKEN` | `token` |
    /// | `LOG_LEVEL` | `logLevel` |
    /// | `REQUEST_TIMEOUT_SECS` | `requestTimeoutSecs` |
    /// | `LEGACY_CDN_NOT_FOUND` | `legacyCdnNotFound` |
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LISTEN_ADDRESS") {
            self.listen_address = v;
        }
        if let Some(v) = lookup("AUTH_TOKEN") {
            self.token = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                self.request_timeout_secs = n;
            }
        }
        if let Some(v) = lookup("LEGACY_CDN_NOT_FOUND") {
            self.legacy_cdn_not_found = parse_bool(&v);
        }
    }

    /// Check the invariants the server relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        for (name, account) in &self.accounts {
            if account.region.is_empty() {
                return Err(ConfigError::MissingRegion(name.clone()));
            }
            if account.backend == Backend::Aws
                && (account.akid.is_empty() || account.secret.is_empty())
            {
                return Err(ConfigError::MissingCredentials(name.clone()));
            }
        }
        Ok(())
    }

    /// The request timeout as a [`Duration`](std::time::Duration).
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which gateway implementation serves an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The AWS SDK clients.
    #[default]
    Aws,
    /// The in-process emulation.
    Memory,
}

/// TLS certificate and hosted zone of a parent domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRegistration {
    /// ACM certificate covering `*.<domain>`.
    pub cert_arn: String,
    /// Route 53 hosted zone of the domain.
    #[serde(rename = "hostedZoneID", alias = "hostedZoneId")]
    pub hosted_zone_id: String,
}

/// Where server access logs of new buckets are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogConfig {
    /// Target bucket.
    pub bucket: String,
    /// Optional key prefix; the bucket name is appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// One set of cloud credentials and its provisioning defaults.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    /// Region buckets are created in.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Access key ID.
    #[builder(default)]
    #[serde(default)]
    pub akid: String,

    /// Secret access key.
    #[builder(default)]
    #[serde(default)]
    pub secret: String,

    /// Endpoint override for S3-compatible providers.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Gateway implementation.
    #[builder(default)]
    #[serde(default)]
    pub backend: Backend,

    /// Bucket-level actions granted by the admin policy.
    #[builder(default = default_bucket_actions())]
    #[serde(default = "default_bucket_actions")]
    pub default_s3_bucket_actions: Vec<String>,

    /// Object-level actions granted by the admin policy.
    #[builder(default = default_object_actions())]
    #[serde(default = "default_object_actions")]
    pub default_s3_object_actions: Vec<String>,

    /// Distribution actions granted by a website's admin policy.
    #[builder(default = default_cloudfront_actions())]
    #[serde(default = "default_cloudfront_actions")]
    pub default_cloudfront_distribution_actions: Vec<String>,

    /// Parent domains websites may be created under.
    #[builder(default)]
    #[serde(default)]
    pub domains: HashMap<String, DomainRegistration>,

    /// Access log target applied to new buckets.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_log: Option<AccessLogConfig>,
}

impl AccountConfig {
    /// The registration of the parent domain of a website name.
    #[must_use]
    pub fn domain_for(&self, website: &str) -> Option<&DomainRegistration> {
        naming::parent_domain(website).and_then(|parent| self.domains.get(parent))
    }

    /// Whether `alias` sits directly under one of the configured domains.
    #[must_use]
    pub fn owns_alias(&self, alias: &str) -> bool {
        self.domain_for(alias).is_some()
    }
}

fn default_listen_address() -> String {
    String::from("0.0.0.0:8080")
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_owned()).collect()
}

fn default_bucket_actions() -> Vec<String> {
    to_strings(&[
        "s3:ListBucket",
        "s3:GetBucketLocation",
        "s3:ListBucketMultipartUploads",
        "s3:ListBucketVersions",
        "s3:GetBucketTagging",
        "s3:GetBucketWebsite",
    ])
}

fn default_object_actions() -> Vec<String> {
    to_strings(&[
        "s3:GetObject",
        "s3:PutObject",
        "s3:DeleteObject",
        "s3:GetObjectAcl",
        "s3:PutObjectAcl",
        "s3:AbortMultipartUpload",
        "s3:ListMultipartUploadParts",
    ])
}

fn default_cloudfront_actions() -> Vec<String> {
    to_strings(&[
        "cloudfront:CreateInvalidation",
        "cloudfront:GetInvalidation",
        "cloudfront:ListInvalidations",
        "cloudfront:GetDistribution",
    ])
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
