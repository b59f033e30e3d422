//! Domain types shared by the cloud gateways and the HTTP responses.
//!
//! These are provider-neutral renditions of the S3, IAM, CloudFront and
//! Route 53 shapes the orchestrator works with. Gateway adapters convert
//! SDK types into these; the HTTP layer serializes them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index document injected when a website configuration omits one.
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";

/// Hosted zone ID that Route 53 uses for every CloudFront alias target.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// IAM policy language version used by every rendered document.
pub const POLICY_VERSION: &str = "2012-10-17";

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// A key/value tag attached to a bucket or distribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    #[serde(default)]
    pub value: String,
}

impl Tag {
    /// Create a tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A bucket as returned by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
}

/// Server access logging target of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingTarget {
    /// Bucket receiving the access logs.
    pub target_bucket: String,
    /// Key prefix for the log objects (always ends with `/`).
    pub target_prefix: String,
}

/// Index document of a website configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexDocument {
    /// Suffix appended to directory requests (e.g. `index.html`).
    pub suffix: String,
}

/// Error document of a website configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorDocument {
    /// Object key served on 4xx errors.
    pub key: String,
}

/// Static website hosting configuration of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    /// Index document; [`DEFAULT_INDEX_DOCUMENT`] when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_document: Option<IndexDocument>,
    /// Optional error document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_document: Option<ErrorDocument>,
}

impl WebsiteConfiguration {
    /// The effective index suffix, defaulting to `index.html`.
    #[must_use]
    pub fn index_suffix(&self) -> &str {
        self.index_document
            .as_ref()
            .map(|d| d.suffix.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_INDEX_DOCUMENT)
    }

    /// The error document key, if any.
    #[must_use]
    pub fn error_key(&self) -> Option<&str> {
        self.error_document.as_ref().map(|d| d.key.as_str())
    }
}

/// Server-side encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SseAlgorithm {
    /// SSE-S3.
    #[default]
    #[serde(rename = "AES256")]
    Aes256,
    /// SSE-KMS.
    #[serde(rename = "aws:kms")]
    AwsKms,
    /// Dual-layer SSE-KMS.
    #[serde(rename = "aws:kms:dsse")]
    AwsKmsDsse,
}

impl SseAlgorithm {
    /// Wire name of the algorithm.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
            Self::AwsKms => "aws:kms",
            Self::AwsKmsDsse => "aws:kms:dsse",
        }
    }
}

/// Default bucket encryption requested at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSideEncryption {
    /// Encryption algorithm.
    #[serde(default)]
    pub algorithm: SseAlgorithm,
    /// KMS key for the `aws:kms` algorithms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Whether S3 bucket keys are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_key_enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An IAM policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version.
    pub version: String,
    /// Statements, evaluated together.
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// Create a document with the current policy language version.
    #[must_use]
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_owned(),
            statement,
        }
    }

    /// Append a statement, returning the document.
    #[must_use]
    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statement.push(statement);
        self
    }

    /// Render the document as the JSON string the providers expect.
    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A single `Allow` statement of a [`PolicyDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Statement identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// `Allow` or `Deny`.
    pub effect: String,
    /// Principal for resource policies (`"*"` for anonymous access).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    /// Actions granted.
    pub action: Vec<String>,
    /// Resources the actions apply to.
    pub resource: Vec<String>,
}

impl PolicyStatement {
    /// An `Allow` statement over the given actions and resources.
    #[must_use]
    pub fn allow(action: Vec<String>, resource: Vec<String>) -> Self {
        Self {
            sid: None,
            effect: "Allow".to_owned(),
            principal: None,
            action,
            resource,
        }
    }

    /// Set the statement ID.
    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Set the principal.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

/// A customer-managed IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedPolicy {
    /// Policy name.
    pub policy_name: String,
    /// Policy ARN.
    pub arn: String,
    /// Stable policy ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Path of the policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Default version identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_version_id: Option<String>,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
}

/// A policy attached to a user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachedPolicy {
    /// Policy name.
    pub policy_name: String,
    /// Policy ARN.
    pub policy_arn: String,
}

/// An IAM user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamUser {
    /// User name.
    pub user_name: String,
    /// Stable user ID.
    pub user_id: String,
    /// User ARN.
    pub arn: String,
    /// Path of the user.
    pub path: String,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
}

/// An IAM group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamGroup {
    /// Group name.
    pub group_name: String,
    /// Stable group ID.
    pub group_id: String,
    /// Group ARN.
    pub arn: String,
    /// Path of the group.
    pub path: String,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
}

/// Access key metadata; the secret is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessKeyMetadata {
    /// Access key ID.
    pub access_key_id: String,
    /// `Active` or `Inactive`.
    pub status: String,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
}

/// A freshly created access key, including its secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessKey {
    /// Owning user.
    pub user_name: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key, revealed only at creation.
    pub secret_access_key: String,
    /// `Active` or `Inactive`.
    pub status: String,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Content distribution
// ---------------------------------------------------------------------------

/// Custom origin of a website distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteOrigin {
    /// Origin identifier, referenced by the cache behavior.
    pub id: String,
    /// Origin domain name.
    pub domain_name: String,
    /// HTTP port.
    pub http_port: i32,
    /// HTTPS port.
    pub https_port: i32,
    /// Origin protocol policy (`http-only`).
    pub protocol_policy: String,
}

/// TLS certificate settings of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    /// ACM certificate ARN.
    pub acm_certificate_arn: String,
    /// SSL support method (`sni-only`).
    pub ssl_support_method: String,
    /// Minimum TLS protocol version.
    pub minimum_protocol_version: String,
}

/// Provider-neutral distribution configuration for a website bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    /// Idempotency token of the create request.
    pub caller_reference: String,
    /// CNAMEs the distribution answers for.
    pub aliases: Vec<String>,
    /// Free-form comment.
    pub comment: String,
    /// Whether the distribution serves traffic.
    pub enabled: bool,
    /// Object returned for `/`.
    pub default_root_object: String,
    /// The single origin.
    pub origin: WebsiteOrigin,
    /// Viewer protocol policy of the default cache behavior.
    pub viewer_protocol_policy: String,
    /// Managed cache policy of the default cache behavior.
    pub cache_policy_id: String,
    /// Whether edge compression is enabled.
    pub compress: bool,
    /// HTTP version (`http2`).
    pub http_version: String,
    /// Whether IPv6 is enabled.
    pub ipv6_enabled: bool,
    /// Price class.
    pub price_class: String,
    /// TLS certificate.
    pub viewer_certificate: ViewerCertificate,
}

/// A CDN distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Distribution {
    /// Distribution ID.
    pub id: String,
    /// Distribution ARN.
    #[serde(rename = "ARN")]
    pub arn: String,
    /// Edge domain name (`dxxxx.cloudfront.net`).
    pub domain_name: String,
    /// Deployment status (`InProgress` or `Deployed`).
    pub status: String,
    /// Whether the distribution serves traffic.
    pub enabled: bool,
    /// CNAMEs.
    pub aliases: Vec<String>,
    /// Last modification time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl Distribution {
    /// Whether the distribution answers for `alias`.
    #[must_use]
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias))
    }

    /// Whether the provider has finished deploying a disabled configuration.
    #[must_use]
    pub fn is_fully_disabled(&self) -> bool {
        !self.enabled && self.status == "Deployed"
    }
}

/// A cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Invalidation {
    /// Invalidation ID.
    pub id: String,
    /// Status (`InProgress` or `Completed`).
    pub status: String,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    /// Invalidated paths.
    pub paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

/// Alias target of a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTarget {
    /// Hosted zone of the alias target.
    pub hosted_zone_id: String,
    /// DNS name of the alias target.
    #[serde(rename = "DNSName")]
    pub dns_name: String,
    /// Whether Route 53 evaluates target health.
    pub evaluate_target_health: bool,
}

/// A DNS record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    /// Fully qualified name, with a trailing dot.
    pub name: String,
    /// Record type (`A`, `CNAME`, ...).
    #[serde(rename = "Type")]
    pub record_type: String,
    /// TTL for non-alias records.
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    /// Alias target for alias records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_target: Option<AliasTarget>,
    /// Values for non-alias records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_records: Vec<String>,
}

impl RecordSet {
    /// An `A` alias record pointing `name` at a CloudFront domain.
    #[must_use]
    pub fn cloudfront_alias(name: &str, distribution_domain: &str) -> Self {
        Self {
            name: fqdn(name),
            record_type: "A".to_owned(),
            ttl: None,
            alias_target: Some(AliasTarget {
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_owned(),
                dns_name: distribution_domain.to_owned(),
                evaluate_target_health: false,
            }),
            resource_records: Vec::new(),
        }
    }

    /// Whether this record matches `host` (with or without trailing dot) and `record_type`.
    #[must_use]
    pub fn matches(&self, host: &str, record_type: &str) -> bool {
        self.name.eq_ignore_ascii_case(&fqdn(host)) && self.record_type == record_type
    }
}

/// Normalize a host name to its fully qualified form with a trailing dot.
#[must_use]
pub fn fqdn(host: &str) -> String {
    if host.ends_with('.') {
        host.to_owned()
    } else {
        format!("{host}.")
    }
}

/// Result of a DNS change submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeInfo {
    /// Change ID.
    pub id: String,
    /// `PENDING` or `INSYNC`.
    pub status: String,
    /// Submission time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Optional comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_index_suffix() {
        let config = WebsiteConfiguration::default();
        assert_eq!(config.index_suffix(), "index.html");

        let config = WebsiteConfiguration {
            index_document: Some(IndexDocument {
                suffix: "home.html".to_owned(),
            }),
            error_document: None,
        };
        assert_eq!(config.index_suffix(), "home.html");
    }

    #[test]
    fn test_should_render_policy_document_in_pascal_case() {
        let doc = PolicyDocument::new(vec![
            PolicyStatement::allow(
                vec!["s3:GetObject".to_owned()],
                vec!["arn:aws:s3:::site/*".to_owned()],
            )
            .with_principal("*"),
        ]);
        let json: serde_json::Value =
            serde_json::from_str(&doc.render().unwrap()).unwrap();
        assert_eq!(json["Version"], "2012-10-17");
        assert_eq!(json["Statement"][0]["Effect"], "Allow");
        assert_eq!(json["Statement"][0]["Principal"], "*");
        assert!(json["Statement"][0].get("Sid").is_none());
    }

    #[test]
    fn test_should_match_record_with_or_without_trailing_dot() {
        let record = RecordSet::cloudfront_alias("site.example.com", "d1.cloudfront.net");
        assert_eq!(record.name, "site.example.com.");
        assert!(record.matches("site.example.com", "A"));
        assert!(record.matches("site.example.com.", "A"));
        assert!(!record.matches("site.example.com", "AAAA"));
    }

    #[test]
    fn test_should_parse_sse_algorithm_names() {
        let sse: ServerSideEncryption =
            serde_json::from_str(r#"{"Algorithm":"aws:kms","KmsKeyId":"k1"}"#).unwrap();
        assert_eq!(sse.algorithm, SseAlgorithm::AwsKms);
        assert_eq!(sse.kms_key_id.as_deref(), Some("k1"));
    }

    #[test]
    fn test_should_detect_fully_disabled_distribution() {
        let mut dist = Distribution {
            id: "E1".to_owned(),
            arn: "arn:aws:cloudfront::1:distribution/E1".to_owned(),
            domain_name: "d1.cloudfront.net".to_owned(),
            status: "InProgress".to_owned(),
            enabled: false,
            aliases: vec!["Site.Example.com".to_owned()],
            last_modified_time: None,
        };
        assert!(dist.has_alias("site.example.com"));
        assert!(!dist.is_fully_disabled());
        dist.status = "Deployed".to_owned();
        assert!(dist.is_fully_disabled());
    }
}
