//! User workflows.
//!
//! Users of a bucket are the members of its admin group. Older deployments
//! created a single user named after the bucket, with a policy of the same
//! name attached directly; listing and deletion still account for it.

use std::sync::Arc;

use s3admin_core::{ApiResult, CallContext, naming};
use s3admin_model::input::CreateUserInput;
use s3admin_model::output::{
    CreateUserOutput, DeleteUserOutput, ListUsersOutput, ResetKeyOutput, ShowUserOutput,
};
use tracing::{debug, info};

use crate::provisioner::{Provisioner, optional, require_name};
use crate::saga::{self, Saga};

impl Provisioner {
    /// Members of the bucket's admin group plus the legacy same-named user.
    /// A missing group or legacy user is not an error.
    pub async fn list_users(&self, ctx: &CallContext, bucket: &str) -> ApiResult<ListUsersOutput> {
        let identity = &self.gateways.identity;
        let group = naming::admin_group_name(bucket);

        let mut users = optional(identity.list_group_users(ctx, &group).await)?.unwrap_or_default();
        if let Some(legacy) = optional(identity.get_user(ctx, bucket).await)? {
            if !users.iter().any(|u| u.user_name == legacy.user_name) {
                debug!(bucket, "found legacy bucket user");
                users.push(legacy);
            }
        }
        Ok(ListUsersOutput { users })
    }

    /// A user with its access key metadata and groups.
    pub async fn show_user(&self, ctx: &CallContext, user: &str) -> ApiResult<ShowUserOutput> {
        let identity = &self.gateways.identity;
        let found = identity.get_user(ctx, user).await?;
        let access_keys = identity.list_access_keys(ctx, user).await?;
        let groups = identity.list_user_groups(ctx, user).await?;
        Ok(ShowUserOutput {
            user: found,
            access_keys,
            groups,
        })
    }

    /// User-Create: user, access key, membership in the bucket's admin group.
    pub async fn create_user(
        &self,
        ctx: &CallContext,
        bucket: &str,
        input: CreateUserInput,
    ) -> ApiResult<CreateUserOutput> {
        require_name("UserName", "InvalidUserName", &input.user_name)?;
        let mut saga = self.saga("user-create");
        let outcome = saga::catch(self.create_user_steps(ctx, &mut saga, bucket, &input.user_name)).await;
        saga.settle(ctx, outcome).await
    }

    async fn create_user_steps(
        &self,
        ctx: &CallContext,
        saga: &mut Saga,
        bucket: &str,
        name: &str,
    ) -> ApiResult<CreateUserOutput> {
        let identity = Arc::clone(&self.gateways.identity);

        let user = identity.create_user(ctx, name).await?;
        {
            let identity = Arc::clone(&identity);
            let name = name.to_owned();
            saga.push(format!("delete user {name}"), move |ctx| async move {
                identity.delete_user(&ctx, &name).await
            });
        }

        let access_key = identity.create_access_key(ctx, name).await?;
        {
            let identity = Arc::clone(&identity);
            let name = name.to_owned();
            let key_id = access_key.access_key_id.clone();
            saga.push(format!("delete access key {key_id}"), move |ctx| async move {
                identity.delete_access_key(&ctx, &name, &key_id).await
            });
        }

        let group = naming::admin_group_name(bucket);
        identity.add_user_to_group(ctx, name, &group).await?;

        info!(account = %self.name, bucket, user = name, "user provisioned");
        Ok(CreateUserOutput { user, access_key })
    }

    /// User-Key-Reset: issue a new key, then delete every older one. A
    /// failure before the old keys are gone deletes the new key again.
    pub async fn reset_user_key(&self, ctx: &CallContext, user: &str) -> ApiResult<ResetKeyOutput> {
        require_name("UserName", "InvalidUserName", user)?;
        let mut saga = self.saga("user-key-reset");
        let outcome = saga::catch(self.reset_key_steps(ctx, &mut saga, user)).await;
        saga.settle(ctx, outcome).await
    }

    async fn reset_key_steps(
        &self,
        ctx: &CallContext,
        saga: &mut Saga,
        user: &str,
    ) -> ApiResult<ResetKeyOutput> {
        let identity = Arc::clone(&self.gateways.identity);
        let previous = identity.list_access_keys(ctx, user).await?;

        let access_key = identity.create_access_key(ctx, user).await?;
        {
            let identity = Arc::clone(&identity);
            let name = user.to_owned();
            let key_id = access_key.access_key_id.clone();
            saga.push(format!("delete access key {key_id}"), move |ctx| async move {
                identity.delete_access_key(&ctx, &name, &key_id).await
            });
        }

        let mut deleted_key_ids = Vec::with_capacity(previous.len());
        for key in previous {
            identity
                .delete_access_key(ctx, user, &key.access_key_id)
                .await?;
            deleted_key_ids.push(key.access_key_id);
        }

        info!(account = %self.name, user, deleted = deleted_key_ids.len(), "access key reset");
        Ok(ResetKeyOutput {
            access_key,
            deleted_key_ids,
        })
    }

    /// User-Delete: keys, group memberships, then directly attached
    /// policies. Policies owned by `bucket` are deleted after detaching.
    /// Steps are not undone on failure.
    pub async fn delete_user(
        &self,
        ctx: &CallContext,
        bucket: &str,
        user: &str,
    ) -> ApiResult<DeleteUserOutput> {
        require_name("UserName", "InvalidUserName", user)?;
        let identity = &self.gateways.identity;
        let mut out = DeleteUserOutput {
            user_name: user.to_owned(),
            ..DeleteUserOutput::default()
        };

        for key in identity.list_access_keys(ctx, user).await? {
            identity
                .delete_access_key(ctx, user, &key.access_key_id)
                .await?;
            out.deleted_key_ids.push(key.access_key_id);
        }

        for group in identity.list_user_groups(ctx, user).await? {
            identity
                .remove_user_from_group(ctx, user, &group.group_name)
                .await?;
            out.removed_from_groups.push(group.group_name);
        }

        for policy in identity.list_attached_user_policies(ctx, user).await? {
            identity
                .detach_user_policy(ctx, user, &policy.policy_arn)
                .await?;
            out.detached_policies.push(policy.policy_name.clone());
            if naming::owned_by_bucket(&policy.policy_name, bucket) {
                identity.delete_policy(ctx, &policy.policy_arn).await?;
                out.deleted_policies.push(policy.policy_name);
            }
        }

        identity.delete_user(ctx, user).await?;
        info!(account = %self.name, bucket, user, "user deleted");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use s3admin_core::ErrorKind;
    use s3admin_gateway::IdentityGateway;
    use s3admin_model::input::{BucketInput, CreateBucketInput};

    use crate::provisioner::fixtures;

    use super::*;

    async fn with_bucket(bucket: &str) -> (Provisioner, s3admin_gateway::MemoryCloud) {
        let (provisioner, cloud) = fixtures::provisioner();
        provisioner
            .create_bucket(
                &CallContext::default(),
                CreateBucketInput {
                    bucket_input: BucketInput {
                        bucket: bucket.to_owned(),
                    },
                    tags: Vec::new(),
                    server_side_encryption: None,
                    website_configuration: None,
                },
            )
            .await
            .unwrap();
        cloud.clear_journal();
        (provisioner, cloud)
    }

    fn user(name: &str) -> CreateUserInput {
        CreateUserInput {
            user_name: name.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_should_create_user_in_admin_group() {
        let (provisioner, cloud) = with_bucket("b1").await;
        let ctx = CallContext::default();

        let out = provisioner.create_user(&ctx, "b1", user("alice")).await.unwrap();

        assert_eq!(out.user.user_name, "alice");
        assert!(!out.access_key.secret_access_key.is_empty());
        assert_eq!(cloud.identity().group_members("b1-BktAdmGrp"), vec!["alice"]);

        let shown = provisioner.show_user(&ctx, "alice").await.unwrap();
        assert_eq!(shown.access_keys.len(), 1);
        assert_eq!(shown.groups[0].group_name, "b1-BktAdmGrp");
    }

    #[tokio::test]
    async fn test_should_remove_user_and_key_when_group_is_missing() {
        let (provisioner, cloud) = with_bucket("b1").await;

        let err = provisioner
            .create_user(&CallContext::default(), "nope", user("alice"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(
            cloud.journal(),
            vec![
                "CreateUser",
                "CreateAccessKey",
                "AddUserToGroup",
                "DeleteAccessKey",
                "DeleteUser"
            ]
        );
        assert!(!cloud.identity().has_user("alice"));
    }

    #[tokio::test]
    async fn test_should_leave_exactly_one_key_after_reset() {
        let (provisioner, cloud) = with_bucket("b1").await;
        let ctx = CallContext::default();
        let created = provisioner.create_user(&ctx, "b1", user("alice")).await.unwrap();
        cloud
            .identity()
            .create_access_key(&ctx, "alice")
            .await
            .unwrap();

        let out = provisioner.reset_user_key(&ctx, "alice").await.unwrap();

        assert_eq!(out.deleted_key_ids.len(), 2);
        assert!(out.deleted_key_ids.contains(&created.access_key.access_key_id));
        let keys = cloud
            .identity()
            .list_access_keys(&ctx, "alice")
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].access_key_id, out.access_key.access_key_id);
    }

    #[tokio::test]
    async fn test_should_delete_new_key_when_reset_fails() {
        let (provisioner, cloud) = with_bucket("b1").await;
        let ctx = CallContext::default();
        let created = provisioner.create_user(&ctx, "b1", user("alice")).await.unwrap();
        cloud.fail_next("DeleteAccessKey", "LimitExceeded");

        let err = provisioner.reset_user_key(&ctx, "alice").await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::LimitExceeded);
        let keys = cloud
            .identity()
            .list_access_keys(&ctx, "alice")
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].access_key_id, created.access_key.access_key_id);
    }

    #[tokio::test]
    async fn test_should_delete_user_with_legacy_policy() {
        let (provisioner, cloud) = with_bucket("b1").await;
        let ctx = CallContext::default();
        let iam = cloud.identity();
        provisioner.create_user(&ctx, "b1", user("b1")).await.unwrap();
        let legacy = iam
            .create_policy(&ctx, "b1", &iam.default_bucket_admin_policy("b1"))
            .await
            .unwrap();
        let shared = iam
            .create_policy(&ctx, "shared-readonly", &iam.default_bucket_admin_policy("b1"))
            .await
            .unwrap();
        iam.attach_user_policy(&ctx, "b1", &legacy.arn).await.unwrap();
        iam.attach_user_policy(&ctx, "b1", &shared.arn).await.unwrap();

        let listed = provisioner.list_users(&ctx, "b1").await.unwrap();
        assert_eq!(listed.users.len(), 1);

        let out = provisioner.delete_user(&ctx, "b1", "b1").await.unwrap();

        assert_eq!(out.deleted_key_ids.len(), 1);
        assert_eq!(out.removed_from_groups, vec!["b1-BktAdmGrp"]);
        assert_eq!(out.deleted_policies, vec!["b1"]);
        assert_eq!(out.detached_policies.len(), 2);
        assert!(!iam.has_user("b1"));
        assert!(!iam.has_policy("b1"));
        assert!(iam.has_policy("shared-readonly"));
    }

    #[tokio::test]
    async fn test_should_list_nothing_for_unknown_bucket() {
        let (provisioner, _cloud) = fixtures::provisioner();
        let listed = provisioner
            .list_users(&CallContext::default(), "ghost")
            .await
            .unwrap();
        assert!(listed.users.is_empty());
    }
}
