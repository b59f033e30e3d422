//! Response bodies.
//!
//! Absent optionals are skipped so responses never carry fields the
//! operation did not produce.

use serde::{Deserialize, Serialize};

use crate::types::{
    AccessKey, AccessKeyMetadata, BucketSummary, ChangeInfo, Distribution, IamGroup, IamUser,
    Invalidation, LoggingTarget, ManagedPolicy, RecordSet, Tag,
};

/// Response of Bucket-Create and Website-Create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBucketOutput {
    /// Bucket location returned by the provider (e.g. `/b1`).
    pub bucket: String,
    /// The bucket admin policy.
    pub policy: ManagedPolicy,
    /// The bucket admin group.
    pub group: IamGroup,
    /// The website distribution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    /// The DNS change that created the website alias record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_change: Option<ChangeInfo>,
}

/// Response of the bucket list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketsOutput {
    /// Buckets visible to the account.
    pub buckets: Vec<BucketSummary>,
}

/// Response of bucket show and website show.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShowBucketOutput {
    /// Bucket tags.
    pub tags: Vec<Tag>,
    /// Access log target, when logging is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingTarget>,
    /// Whether the bucket holds no objects (folder placeholders excluded).
    pub empty: bool,
    /// Website distribution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    /// Website distribution tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_tags: Option<Vec<Tag>>,
    /// Website alias record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_record: Option<RecordSet>,
}

/// A cleanup step that failed after the bucket itself was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CleanupError {
    /// Which step failed (e.g. `DeleteGroup`).
    pub step: String,
    /// Error tag.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Response of Bucket-Delete and Website-Delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteBucketOutput {
    /// Name of the deleted bucket.
    pub bucket: String,
    /// Policies detached from the admin group.
    pub detached_policies: Vec<String>,
    /// Policies deleted.
    pub deleted_policies: Vec<String>,
    /// Users removed from the admin group.
    pub removed_users: Vec<String>,
    /// The website alias record as it was before deletion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_record: Option<RecordSet>,
    /// The website distribution as it was before deletion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    /// Set when the distribution is still being disabled; retry the delete.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub distribution_pending: bool,
    /// Failures of the cleanup steps that followed the bucket deletion.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<CleanupError>,
}

/// Response of the bucket and website tag updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateTagsOutput {
    /// The tag set now on the bucket.
    pub tags: Vec<Tag>,
    /// The distribution whose tags were also updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
}

/// Response of the website list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListWebsitesOutput {
    /// Distributions aliased to one of the account's domains.
    pub distributions: Vec<Distribution>,
}

/// Response of Website-Patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvalidationOutput {
    /// Distribution the invalidation was issued against.
    pub distribution_id: String,
    /// The invalidation.
    pub invalidation: Invalidation,
}

/// Response of the user list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersOutput {
    /// Members of the admin group, plus a legacy same-named user if present.
    pub users: Vec<IamUser>,
}

/// Response of user show.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShowUserOutput {
    /// The user.
    pub user: IamUser,
    /// The user's access keys, without secrets.
    pub access_keys: Vec<AccessKeyMetadata>,
    /// Groups the user belongs to.
    pub groups: Vec<IamGroup>,
}

/// Response of User-Create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserOutput {
    /// The created user.
    pub user: IamUser,
    /// Its first access key, including the secret.
    pub access_key: AccessKey,
}

/// Response of Key-Reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResetKeyOutput {
    /// The new access key, including the secret.
    pub access_key: AccessKey,
    /// IDs of the keys that were replaced.
    pub deleted_key_ids: Vec<String>,
}

/// Response of User-Delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserOutput {
    /// Name of the deleted user.
    pub user_name: String,
    /// Access keys deleted.
    pub deleted_key_ids: Vec<String>,
    /// Groups the user was removed from.
    pub removed_from_groups: Vec<String>,
    /// Policies detached from the user.
    pub detached_policies: Vec<String>,
    /// Bucket-owned policies deleted.
    pub deleted_policies: Vec<String>,
}

/// Response of `/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionOutput {
    /// Crate version.
    pub version: String,
    /// Git commit the binary was built from.
    pub githash: String,
    /// Build timestamp.
    pub buildstamp: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorOutput {
    /// Error tag.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Request ID for log correlation.
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_omit_website_fields_for_plain_bucket_delete() {
        let out = DeleteBucketOutput {
            bucket: "b1".to_owned(),
            ..DeleteBucketOutput::default()
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["Bucket"], "b1");
        assert!(json.get("DnsRecord").is_none());
        assert!(json.get("DistributionPending").is_none());
        assert!(json.get("Errors").is_none());
    }

    #[test]
    fn test_should_serialize_error_output() {
        let out = ErrorOutput {
            code: "Unauthorized".to_owned(),
            message: "missing token".to_owned(),
            request_id: "r1".to_owned(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["Code"], "Unauthorized");
        assert_eq!(json["RequestId"], "r1");
    }
}
