//! Policy document templates.

use s3admin_core::AccountConfig;
use s3admin_model::{PolicyDocument, PolicyStatement};

/// Action lists an account grants through its admin policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefaults {
    /// Actions on the bucket resource.
    pub bucket_actions: Vec<String>,
    /// Actions on the objects of the bucket.
    pub object_actions: Vec<String>,
    /// Actions on distributions, for website buckets.
    pub distribution_actions: Vec<String>,
}

impl PolicyDefaults {
    /// Take the action lists of an account.
    #[must_use]
    pub fn from_account(account: &AccountConfig) -> Self {
        Self {
            bucket_actions: account.default_s3_bucket_actions.clone(),
            object_actions: account.default_s3_object_actions.clone(),
            distribution_actions: account.default_cloudfront_distribution_actions.clone(),
        }
    }
}

/// ARN of a bucket.
#[must_use]
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

/// ARN matching every object of a bucket.
#[must_use]
pub fn objects_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}/*")
}

/// Admin policy: bucket actions on the bucket, object actions on its objects.
#[must_use]
pub fn bucket_admin_policy(defaults: &PolicyDefaults, bucket: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow(defaults.bucket_actions.clone(), vec![bucket_arn(bucket)])
            .with_sid("BucketAdmin"),
        PolicyStatement::allow(defaults.object_actions.clone(), vec![objects_arn(bucket)])
            .with_sid("ObjectAdmin"),
    ])
}

/// Website admin policy: the bucket admin policy plus the distribution actions.
///
/// The distribution does not exist when the policy is created, so the
/// distribution statement is not scoped to an ARN.
#[must_use]
pub fn website_admin_policy(defaults: &PolicyDefaults, bucket: &str) -> PolicyDocument {
    let doc = bucket_admin_policy(defaults, bucket);
    if defaults.distribution_actions.is_empty() {
        return doc;
    }
    doc.with_statement(
        PolicyStatement::allow(defaults.distribution_actions.clone(), vec!["*".to_owned()])
            .with_sid("DistributionAdmin"),
    )
}

/// Bucket policy letting anyone read the objects of a website bucket.
#[must_use]
pub fn website_public_read_policy(bucket: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow(vec!["s3:GetObject".to_owned()], vec![objects_arn(bucket)])
            .with_sid("PublicRead")
            .with_principal("*"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PolicyDefaults {
        PolicyDefaults::from_account(&AccountConfig::builder().build())
    }

    #[test]
    fn test_should_scope_admin_policy_to_bucket_and_objects() {
        let doc = bucket_admin_policy(&defaults(), "b1");
        assert_eq!(doc.version, "2012-10-17");
        assert_eq!(doc.statement.len(), 2);
        assert_eq!(doc.statement[0].resource, vec!["arn:aws:s3:::b1"]);
        assert!(doc.statement[0].action.contains(&"s3:ListBucket".to_owned()));
        assert_eq!(doc.statement[1].resource, vec!["arn:aws:s3:::b1/*"]);
        assert!(doc.statement[1].action.contains(&"s3:PutObject".to_owned()));
    }

    #[test]
    fn test_should_add_distribution_actions_for_websites() {
        let doc = website_admin_policy(&defaults(), "site.example.com");
        assert_eq!(doc.statement.len(), 3);
        assert!(
            doc.statement[2]
                .action
                .contains(&"cloudfront:CreateInvalidation".to_owned())
        );
    }

    #[test]
    fn test_should_render_public_read_policy() {
        let rendered = website_public_read_policy("site.example.com")
            .render()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(json["Statement"][0]["Principal"], "*");
        assert_eq!(json["Statement"][0]["Action"][0], "s3:GetObject");
        assert_eq!(
            json["Statement"][0]["Resource"][0],
            "arn:aws:s3:::site.example.com/*"
        );
    }
}
