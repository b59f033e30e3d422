//! Request bodies.
//!
//! Unknown fields are ignored and collections default to empty, so a
//! minimal `{}` body is accepted wherever every field is optional.

use serde::{Deserialize, Serialize};

use crate::types::{ServerSideEncryption, Tag, WebsiteConfiguration};

/// Bucket identification inside a create request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketInput {
    /// Name of the bucket to create.
    pub bucket: String,
}

/// Body of `POST /{account}/buckets` and `POST /{account}/websites`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBucketInput {
    /// The bucket to create.
    pub bucket_input: BucketInput,
    /// Tags applied to the bucket (and to the distribution of a website).
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Optional default encryption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_side_encryption: Option<ServerSideEncryption>,
    /// Website configuration; only used when creating a website.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
}

/// Body of `PUT /{account}/buckets/{bucket}` and `PUT /{account}/websites/{website}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateTagsInput {
    /// The complete new tag set.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Body of `PATCH /{account}/websites/{website}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatchWebsiteInput {
    /// Paths to invalidate at the edge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_invalidation: Option<Vec<String>>,
}

/// Body of `POST /{account}/{buckets|websites}/{name}/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserInput {
    /// Name of the user to create.
    pub user_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_create_bucket_input_and_ignore_unknown_fields() {
        let input: CreateBucketInput = serde_json::from_str(
            r#"{"Tags":[{"Key":"App","Value":"X"}],"BucketInput":{"Bucket":"b1"},"Extra":1}"#,
        )
        .unwrap();
        assert_eq!(input.bucket_input.bucket, "b1");
        assert_eq!(input.tags, vec![Tag::new("App", "X")]);
        assert!(input.website_configuration.is_none());
    }

    #[test]
    fn test_should_default_missing_tags() {
        let input: UpdateTagsInput = serde_json::from_str("{}").unwrap();
        assert!(input.tags.is_empty());
    }
}
