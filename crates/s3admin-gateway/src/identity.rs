//! Identity gateway.

use std::fmt;

use async_trait::async_trait;
use s3admin_core::{ApiResult, CallContext};
use s3admin_model::{
    AccessKey, AccessKeyMetadata, AttachedPolicy, IamGroup, IamUser, ManagedPolicy,
    PolicyDocument,
};

use crate::policy::{self, PolicyDefaults};

/// User, group, key and policy operations of the identity service.
#[async_trait]
pub trait IdentityGateway: Send + Sync + fmt::Debug {
    /// Create a user.
    async fn create_user(&self, ctx: &CallContext, name: &str) -> ApiResult<IamUser>;

    /// Delete a user. The user must have no keys, groups or attached policies.
    async fn delete_user(&self, ctx: &CallContext, name: &str) -> ApiResult<()>;

    /// Fetch a user.
    async fn get_user(&self, ctx: &CallContext, name: &str) -> ApiResult<IamUser>;

    /// Members of a group.
    async fn list_group_users(&self, ctx: &CallContext, group: &str) -> ApiResult<Vec<IamUser>>;

    /// Groups a user belongs to.
    async fn list_user_groups(&self, ctx: &CallContext, user: &str) -> ApiResult<Vec<IamGroup>>;

    /// Add a user to a group.
    async fn add_user_to_group(&self, ctx: &CallContext, user: &str, group: &str)
    -> ApiResult<()>;

    /// Remove a user from a group.
    async fn remove_user_from_group(
        &self,
        ctx: &CallContext,
        user: &str,
        group: &str,
    ) -> ApiResult<()>;

    /// Create an access key; the secret is only returned here.
    async fn create_access_key(&self, ctx: &CallContext, user: &str) -> ApiResult<AccessKey>;

    /// Delete an access key.
    async fn delete_access_key(&self, ctx: &CallContext, user: &str, key_id: &str)
    -> ApiResult<()>;

    /// Access keys of a user.
    async fn list_access_keys(
        &self,
        ctx: &CallContext,
        user: &str,
    ) -> ApiResult<Vec<AccessKeyMetadata>>;

    /// Create a managed policy.
    async fn create_policy(
        &self,
        ctx: &CallContext,
        name: &str,
        document: &PolicyDocument,
    ) -> ApiResult<ManagedPolicy>;

    /// Delete a managed policy. It must not be attached anywhere.
    async fn delete_policy(&self, ctx: &CallContext, arn: &str) -> ApiResult<()>;

    /// Policies attached to a group.
    async fn list_attached_group_policies(
        &self,
        ctx: &CallContext,
        group: &str,
    ) -> ApiResult<Vec<AttachedPolicy>>;

    /// Policies attached to a user.
    async fn list_attached_user_policies(
        &self,
        ctx: &CallContext,
        user: &str,
    ) -> ApiResult<Vec<AttachedPolicy>>;

    /// Attach a policy to a group.
    async fn attach_group_policy(&self, ctx: &CallContext, group: &str, arn: &str)
    -> ApiResult<()>;

    /// Detach a policy from a group.
    async fn detach_group_policy(&self, ctx: &CallContext, group: &str, arn: &str)
    -> ApiResult<()>;

    /// Attach a policy to a user.
    async fn attach_user_policy(&self, ctx: &CallContext, user: &str, arn: &str)
    -> ApiResult<()>;

    /// Detach a policy from a user.
    async fn detach_user_policy(&self, ctx: &CallContext, user: &str, arn: &str)
    -> ApiResult<()>;

    /// Create a group.
    async fn create_group(&self, ctx: &CallContext, name: &str) -> ApiResult<IamGroup>;

    /// Delete a group. It must have no members or attached policies.
    async fn delete_group(&self, ctx: &CallContext, name: &str) -> ApiResult<()>;

    /// Action lists the default policies are rendered from.
    fn policy_defaults(&self) -> &PolicyDefaults;

    /// Admin policy granting the account's bucket and object actions on `bucket`.
    fn default_bucket_admin_policy(&self, bucket: &str) -> PolicyDocument {
        policy::bucket_admin_policy(self.policy_defaults(), bucket)
    }

    /// Admin policy of a website bucket, which also covers its distribution.
    fn default_website_admin_policy(&self, bucket: &str) -> PolicyDocument {
        policy::website_admin_policy(self.policy_defaults(), bucket)
    }

    /// Anonymous read access to the objects of `bucket`.
    fn default_website_access_policy(&self, bucket: &str) -> PolicyDocument {
        policy::website_public_read_policy(bucket)
    }
}
