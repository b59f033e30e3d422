//! IAM gateway.

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_sdk_iam::types as iam;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService, ErrorClassifier};
use s3admin_model::{
    AccessKey, AccessKeyMetadata, AttachedPolicy, IamGroup, IamUser, ManagedPolicy,
    PolicyDocument,
};

use super::{build_error, sdk_error, to_chrono};
use crate::identity::IdentityGateway;
use crate::policy::PolicyDefaults;

/// [`IdentityGateway`] over the IAM API.
#[derive(Debug, Clone)]
pub struct AwsIdentityGateway {
    client: Client,
    classifier: ErrorClassifier,
    defaults: PolicyDefaults,
}

impl AwsIdentityGateway {
    /// Wrap an IAM client.
    #[must_use]
    pub fn new(client: Client, classifier: ErrorClassifier, defaults: PolicyDefaults) -> Self {
        Self {
            client,
            classifier,
            defaults,
        }
    }

    fn error<E>(&self, context: &str, err: SdkError<E, HttpResponse>) -> ApiError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        sdk_error(&self.classifier, CloudService::Identity, context, err)
    }
}

fn missing(context: &str, what: &str) -> ApiError {
    ApiError::internal(format!("{context}: response has no {what}"))
}

fn convert_user(user: &iam::User) -> IamUser {
    IamUser {
        user_name: user.user_name().to_owned(),
        user_id: user.user_id().to_owned(),
        arn: user.arn().to_owned(),
        path: user.path().to_owned(),
        create_date: to_chrono(user.create_date()),
    }
}

fn convert_group(group: &iam::Group) -> IamGroup {
    IamGroup {
        group_name: group.group_name().to_owned(),
        group_id: group.group_id().to_owned(),
        arn: group.arn().to_owned(),
        path: group.path().to_owned(),
        create_date: to_chrono(group.create_date()),
    }
}

fn convert_attached(policies: &[iam::AttachedPolicy]) -> Vec<AttachedPolicy> {
    policies
        .iter()
        .filter_map(|p| {
            Some(AttachedPolicy {
                policy_name: p.policy_name()?.to_owned(),
                policy_arn: p.policy_arn()?.to_owned(),
            })
        })
        .collect()
}

#[async_trait]
impl IdentityGateway for AwsIdentityGateway {
    async fn create_user(&self, ctx: &CallContext, name: &str) -> ApiResult<IamUser> {
        ctx.run("CreateUser", async {
            let out = self
                .client
                .create_user()
                .user_name(name)
                .send()
                .await
                .map_err(|e| self.error("CreateUser", e))?;
            out.user()
                .map(convert_user)
                .ok_or_else(|| missing("CreateUser", "user"))
        })
        .await
    }

    async fn delete_user(&self, ctx: &CallContext, name: &str) -> ApiResult<()> {
        ctx.run("DeleteUser", async {
            self.client
                .delete_user()
                .user_name(name)
                .send()
                .await
                .map_err(|e| self.error("DeleteUser", e))?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, ctx: &CallContext, name: &str) -> ApiResult<IamUser> {
        ctx.run("GetUser", async {
            let out = self
                .client
                .get_user()
                .user_name(name)
                .send()
                .await
                .map_err(|e| self.error("GetUser", e))?;
            out.user()
                .map(convert_user)
                .ok_or_else(|| missing("GetUser", "user"))
        })
        .await
    }

    async fn list_group_users(&self, ctx: &CallContext, group: &str) -> ApiResult<Vec<IamUser>> {
        ctx.run("GetGroup", async {
            let mut users = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let out = self
                    .client
                    .get_group()
                    .group_name(group)
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| self.error("GetGroup", e))?;
                users.extend(out.users().iter().map(convert_user));
                match out.marker() {
                    Some(next) if out.is_truncated() => marker = Some(next.to_owned()),
                    _ => break,
                }
            }
            Ok(users)
        })
        .await
    }

    async fn list_user_groups(&self, ctx: &CallContext, user: &str) -> ApiResult<Vec<IamGroup>> {
        ctx.run("ListGroupsForUser", async {
            let out = self
                .client
                .list_groups_for_user()
                .user_name(user)
                .send()
                .await
                .map_err(|e| self.error("ListGroupsForUser", e))?;
            Ok(out.groups().iter().map(convert_group).collect())
        })
        .await
    }

    async fn add_user_to_group(&self, ctx: &CallContext, user: &str, group: &str) -> ApiResult<()> {
        ctx.run("AddUserToGroup", async {
            self.client
                .add_user_to_group()
                .user_name(user)
                .group_name(group)
                .send()
                .await
                .map_err(|e| self.error("AddUserToGroup", e))?;
            Ok(())
        })
        .await
    }

    async fn remove_user_from_group(
        &self,
        ctx: &CallContext,
        user: &str,
        group: &str,
    ) -> ApiResult<()> {
        ctx.run("RemoveUserFromGroup", async {
            self.client
                .remove_user_from_group()
                .user_name(user)
                .group_name(group)
                .send()
                .await
                .map_err(|e| self.error("RemoveUserFromGroup", e))?;
            Ok(())
        })
        .await
    }

    async fn create_access_key(&self, ctx: &CallContext, user: &str) -> ApiResult<AccessKey> {
        ctx.run("CreateAccessKey", async {
            let out = self
                .client
                .create_access_key()
                .user_name(user)
                .send()
                .await
                .map_err(|e| self.error("CreateAccessKey", e))?;
            let key = out
                .access_key()
                .ok_or_else(|| missing("CreateAccessKey", "access key"))?;
            Ok(AccessKey {
                user_name: key.user_name().to_owned(),
                access_key_id: key.access_key_id().to_owned(),
                secret_access_key: key.secret_access_key().to_owned(),
                status: key.status().as_str().to_owned(),
                create_date: key.create_date().and_then(to_chrono),
            })
        })
        .await
    }

    async fn delete_access_key(
        &self,
        ctx: &CallContext,
        user: &str,
        key_id: &str,
    ) -> ApiResult<()> {
        ctx.run("DeleteAccessKey", async {
            self.client
                .delete_access_key()
                .user_name(user)
                .access_key_id(key_id)
                .send()
                .await
                .map_err(|e| self.error("DeleteAccessKey", e))?;
            Ok(())
        })
        .await
    }

    async fn list_access_keys(
        &self,
        ctx: &CallContext,
        user: &str,
    ) -> ApiResult<Vec<AccessKeyMetadata>> {
        ctx.run("ListAccessKeys", async {
            let out = self
                .client
                .list_access_keys()
                .user_name(user)
                .send()
                .await
                .map_err(|e| self.error("ListAccessKeys", e))?;
            Ok(out
                .access_key_metadata()
                .iter()
                .filter_map(|k| {
                    Some(AccessKeyMetadata {
                        access_key_id: k.access_key_id()?.to_owned(),
                        status: k
                            .status()
                            .map_or_else(|| "Active".to_owned(), |s| s.as_str().to_owned()),
                        create_date: k.create_date().and_then(to_chrono),
                    })
                })
                .collect())
        })
        .await
    }

    async fn create_policy(
        &self,
        ctx: &CallContext,
        name: &str,
        document: &PolicyDocument,
    ) -> ApiResult<ManagedPolicy> {
        let rendered = document
            .render()
            .map_err(|e| build_error("CreatePolicy", e))?;
        ctx.run("CreatePolicy", async {
            let out = self
                .client
                .create_policy()
                .policy_name(name)
                .policy_document(rendered)
                .send()
                .await
                .map_err(|e| self.error("CreatePolicy", e))?;
            let policy = out
                .policy()
                .ok_or_else(|| missing("CreatePolicy", "policy"))?;
            Ok(ManagedPolicy {
                policy_name: policy.policy_name().unwrap_or(name).to_owned(),
                arn: policy
                    .arn()
                    .ok_or_else(|| missing("CreatePolicy", "policy arn"))?
                    .to_owned(),
                policy_id: policy.policy_id().map(str::to_owned),
                path: policy.path().map(str::to_owned),
                default_version_id: policy.default_version_id().map(str::to_owned),
                create_date: policy.create_date().and_then(to_chrono),
            })
        })
        .await
    }

    async fn delete_policy(&self, ctx: &CallContext, arn: &str) -> ApiResult<()> {
        ctx.run("DeletePolicy", async {
            self.client
                .delete_policy()
                .policy_arn(arn)
                .send()
                .await
                .map_err(|e| self.error("DeletePolicy", e))?;
            Ok(())
        })
        .await
    }

    async fn list_attached_group_policies(
        &self,
        ctx: &CallContext,
        group: &str,
    ) -> ApiResult<Vec<AttachedPolicy>> {
        ctx.run("ListAttachedGroupPolicies", async {
            let out = self
                .client
                .list_attached_group_policies()
                .group_name(group)
                .send()
                .await
                .map_err(|e| self.error("ListAttachedGroupPolicies", e))?;
            Ok(convert_attached(out.attached_policies()))
        })
        .await
    }

    async fn list_attached_user_policies(
        &self,
        ctx: &CallContext,
        user: &str,
    ) -> ApiResult<Vec<AttachedPolicy>> {
        ctx.run("ListAttachedUserPolicies", async {
            let out = self
                .client
                .list_attached_user_policies()
                .user_name(user)
                .send()
                .await
                .map_err(|e| self.error("ListAttachedUserPolicies", e))?;
            Ok(convert_attached(out.attached_policies()))
        })
        .await
    }

    async fn attach_group_policy(&self, ctx: &CallContext, group: &str, arn: &str) -> ApiResult<()> {
        ctx.run("AttachGroupPolicy", async {
            self.client
                .attach_group_policy()
                .group_name(group)
                .policy_arn(arn)
                .send()
                .await
                .map_err(|e| self.error("AttachGroupPolicy", e))?;
            Ok(())
        })
        .await
    }

    async fn detach_group_policy(&self, ctx: &CallContext, group: &str, arn: &str) -> ApiResult<()> {
        ctx.run("DetachGroupPolicy", async {
            self.client
                .detach_group_policy()
                .group_name(group)
                .policy_arn(arn)
                .send()
                .await
                .map_err(|e| self.error("DetachGroupPolicy", e))?;
            Ok(())
        })
        .await
    }

    async fn attach_user_policy(&self, ctx: &CallContext, user: &str, arn: &str) -> ApiResult<()> {
        ctx.run("AttachUserPolicy", async {
            self.client
                .attach_user_policy()
                .user_name(user)
                .policy_arn(arn)
                .send()
                .await
                .map_err(|e| self.error("AttachUserPolicy", e))?;
            Ok(())
        })
        .await
    }

    async fn detach_user_policy(&self, ctx: &CallContext, user: &str, arn: &str) -> ApiResult<()> {
        ctx.run("DetachUserPolicy", async {
            self.client
                .detach_user_policy()
                .user_name(user)
                .policy_arn(arn)
                .send()
                .await
                .map_err(|e| self.error("DetachUserPolicy", e))?;
            Ok(())
        })
        .await
    }

    async fn create_group(&self, ctx: &CallContext, name: &str) -> ApiResult<IamGroup> {
        ctx.run("CreateGroup", async {
            let out = self
                .client
                .create_group()
                .group_name(name)
                .send()
                .await
                .map_err(|e| self.error("CreateGroup", e))?;
            out.group()
                .map(convert_group)
                .ok_or_else(|| missing("CreateGroup", "group"))
        })
        .await
    }

    async fn delete_group(&self, ctx: &CallContext, name: &str) -> ApiResult<()> {
        ctx.run("DeleteGroup", async {
            self.client
                .delete_group()
                .group_name(name)
                .send()
                .await
                .map_err(|e| self.error("DeleteGroup", e))?;
            Ok(())
        })
        .await
    }

    fn policy_defaults(&self) -> &PolicyDefaults {
        &self.defaults
    }
}
