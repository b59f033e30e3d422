//! In-memory identity service.
//!
//! Users, groups and policies reference each other, so the whole identity
//! state sits behind one lock and every operation sees a consistent view.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService};
use s3admin_model::{
    AccessKey, AccessKeyMetadata, AttachedPolicy, IamGroup, IamUser, ManagedPolicy,
    PolicyDocument,
};

use super::{Harness, MEMORY_ACCOUNT_ID};
use crate::identity::IdentityGateway;
use crate::policy::PolicyDefaults;

const SERVICE: CloudService = CloudService::Identity;

#[derive(Debug)]
struct UserEntry {
    user: IamUser,
    keys: Vec<AccessKeyMetadata>,
    groups: BTreeSet<String>,
    policies: BTreeSet<String>,
}

#[derive(Debug)]
struct GroupEntry {
    group: IamGroup,
    members: BTreeSet<String>,
    policies: BTreeSet<String>,
}

#[derive(Debug)]
struct PolicyEntry {
    policy: ManagedPolicy,
    document: String,
    attachments: usize,
}

#[derive(Debug, Default)]
struct IdentityState {
    users: BTreeMap<String, UserEntry>,
    groups: BTreeMap<String, GroupEntry>,
    /// Keyed by ARN.
    policies: BTreeMap<String, PolicyEntry>,
}

/// [`IdentityGateway`] backed by an in-process user/group/policy store.
#[derive(Debug)]
pub struct MemoryIdentityGateway {
    harness: Arc<Harness>,
    defaults: PolicyDefaults,
    state: Mutex<IdentityState>,
}

fn arn(kind: &str, name: &str) -> String {
    format!("arn:aws:iam::{MEMORY_ACCOUNT_ID}:{kind}/{name}")
}

fn attached(state: &IdentityState, arns: &BTreeSet<String>) -> Vec<AttachedPolicy> {
    arns.iter()
        .filter_map(|arn| state.policies.get(arn))
        .map(|p| AttachedPolicy {
            policy_name: p.policy.policy_name.clone(),
            policy_arn: p.policy.arn.clone(),
        })
        .collect()
}

impl MemoryIdentityGateway {
    pub(crate) fn new(harness: Arc<Harness>, defaults: PolicyDefaults) -> Self {
        Self {
            harness,
            defaults,
            state: Mutex::new(IdentityState::default()),
        }
    }

    fn no_such_entity(&self, operation: &str, what: &str, name: &str) -> ApiError {
        self.harness.error(
            SERVICE,
            operation,
            "NoSuchEntity",
            format!("The {what} with name {name} cannot be found."),
        )
    }

    fn delete_conflict(&self, operation: &str, message: String) -> ApiError {
        self.harness
            .error(SERVICE, operation, "DeleteConflict", message)
    }

    fn already_exists(&self, operation: &str, what: &str, name: &str) -> ApiError {
        self.harness.error(
            SERVICE,
            operation,
            "EntityAlreadyExists",
            format!("{what} with name {name} already exists."),
        )
    }

    fn id(&self, prefix: &str) -> String {
        format!("{prefix}{:016X}", self.harness.next_id())
    }

    /// Whether a user exists.
    #[must_use]
    pub fn has_user(&self, name: &str) -> bool {
        self.state.lock().users.contains_key(name)
    }

    /// Whether a group exists.
    #[must_use]
    pub fn has_group(&self, name: &str) -> bool {
        self.state.lock().groups.contains_key(name)
    }

    /// Whether a managed policy with this name exists.
    #[must_use]
    pub fn has_policy(&self, name: &str) -> bool {
        self.state
            .lock()
            .policies
            .values()
            .any(|p| p.policy.policy_name == name)
    }

    /// The document of a managed policy, by name.
    #[must_use]
    pub fn policy_document(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .policies
            .values()
            .find(|p| p.policy.policy_name == name)
            .map(|p| p.document.clone())
    }

    /// Names of the policies attached to a group.
    #[must_use]
    pub fn group_policy_names(&self, group: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .groups
            .get(group)
            .map(|g| {
                attached(&state, &g.policies)
                    .into_iter()
                    .map(|p| p.policy_name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Members of a group.
    #[must_use]
    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.state
            .lock()
            .groups
            .get(group)
            .map(|g| g.members.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityGateway for MemoryIdentityGateway {
    async fn create_user(&self, ctx: &CallContext, name: &str) -> ApiResult<IamUser> {
        self.harness
            .call(ctx, SERVICE, "CreateUser", async {
                let mut state = self.state.lock();
                if state.users.contains_key(name) {
                    return Err(self.already_exists("CreateUser", "User", name));
                }
                let user = IamUser {
                    user_name: name.to_owned(),
                    user_id: self.id("AIDA"),
                    arn: arn("user", name),
                    path: "/".to_owned(),
                    create_date: Some(Utc::now()),
                };
                state.users.insert(
                    name.to_owned(),
                    UserEntry {
                        user: user.clone(),
                        keys: Vec::new(),
                        groups: BTreeSet::new(),
                        policies: BTreeSet::new(),
                    },
                );
                Ok(user)
            })
            .await
    }

    async fn delete_user(&self, ctx: &CallContext, name: &str) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DeleteUser", async {
                let mut state = self.state.lock();
                let entry = state
                    .users
                    .get(name)
                    .ok_or_else(|| self.no_such_entity("DeleteUser", "user", name))?;
                if !entry.keys.is_empty() || !entry.groups.is_empty() || !entry.policies.is_empty()
                {
                    return Err(self.delete_conflict(
                        "DeleteUser",
                        format!("Cannot delete entity, must remove keys, groups and policies of {name} first."),
                    ));
                }
                state.users.remove(name);
                Ok(())
            })
            .await
    }

    async fn get_user(&self, ctx: &CallContext, name: &str) -> ApiResult<IamUser> {
        self.harness
            .call(ctx, SERVICE, "GetUser", async {
                self.state
                    .lock()
                    .users
                    .get(name)
                    .map(|u| u.user.clone())
                    .ok_or_else(|| self.no_such_entity("GetUser", "user", name))
            })
            .await
    }

    async fn list_group_users(&self, ctx: &CallContext, group: &str) -> ApiResult<Vec<IamUser>> {
        self.harness
            .call(ctx, SERVICE, "GetGroup", async {
                let state = self.state.lock();
                let entry = state
                    .groups
                    .get(group)
                    .ok_or_else(|| self.no_such_entity("GetGroup", "group", group))?;
                Ok(entry
                    .members
                    .iter()
                    .filter_map(|m| state.users.get(m))
                    .map(|u| u.user.clone())
                    .collect())
            })
            .await
    }

    async fn list_user_groups(&self, ctx: &CallContext, user: &str) -> ApiResult<Vec<IamGroup>> {
        self.harness
            .call(ctx, SERVICE, "ListGroupsForUser", async {
                let state = self.state.lock();
                let entry = state
                    .users
                    .get(user)
                    .ok_or_else(|| self.no_such_entity("ListGroupsForUser", "user", user))?;
                Ok(entry
                    .groups
                    .iter()
                    .filter_map(|g| state.groups.get(g))
                    .map(|g| g.group.clone())
                    .collect())
            })
            .await
    }

    async fn add_user_to_group(&self, ctx: &CallContext, user: &str, group: &str) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "AddUserToGroup", async {
                let mut state = self.state.lock();
                if !state.users.contains_key(user) {
                    return Err(self.no_such_entity("AddUserToGroup", "user", user));
                }
                let entry = state
                    .groups
                    .get_mut(group)
                    .ok_or_else(|| self.no_such_entity("AddUserToGroup", "group", group))?;
                entry.members.insert(user.to_owned());
                if let Some(u) = state.users.get_mut(user) {
                    u.groups.insert(group.to_owned());
                }
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
        self.harness
            .call(ctx, SERVICE, "RemoveUserFromGroup", async {
                let mut state = self.state.lock();
                let entry = state
                    .groups
                    .get_mut(group)
                    .ok_or_else(|| self.no_such_entity("RemoveUserFromGroup", "group", group))?;
                if !entry.members.remove(user) {
                    return Err(self.no_such_entity("RemoveUserFromGroup", "user", user));
                }
                if let Some(u) = state.users.get_mut(user) {
                    u.groups.remove(group);
                }
                Ok(())
            })
            .await
    }

    async fn create_access_key(&self, ctx: &CallContext, user: &str) -> ApiResult<AccessKey> {
        self.harness
            .call(ctx, SERVICE, "CreateAccessKey", async {
                let mut state = self.state.lock();
                let entry = state
                    .users
                    .get_mut(user)
                    .ok_or_else(|| self.no_such_entity("CreateAccessKey", "user", user))?;
                let key = AccessKey {
                    user_name: user.to_owned(),
                    access_key_id: self.id("AKIA"),
                    secret_access_key: uuid::Uuid::new_v4().simple().to_string(),
                    status: "Active".to_owned(),
                    create_date: Some(Utc::now()),
                };
                entry.keys.push(AccessKeyMetadata {
                    access_key_id: key.access_key_id.clone(),
                    status: key.status.clone(),
                    create_date: key.create_date,
                });
                Ok(key)
            })
            .await
    }

    async fn delete_access_key(
        &self,
        ctx: &CallContext,
        user: &str,
        key_id: &str,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DeleteAccessKey", async {
                let mut state = self.state.lock();
                let entry = state
                    .users
                    .get_mut(user)
                    .ok_or_else(|| self.no_such_entity("DeleteAccessKey", "user", user))?;
                let before = entry.keys.len();
                entry.keys.retain(|k| k.access_key_id != key_id);
                if entry.keys.len() == before {
                    return Err(self.no_such_entity("DeleteAccessKey", "access key", key_id));
                }
                Ok(())
            })
            .await
    }

    async fn list_access_keys(
        &self,
        ctx: &CallContext,
        user: &str,
    ) -> ApiResult<Vec<AccessKeyMetadata>> {
        self.harness
            .call(ctx, SERVICE, "ListAccessKeys", async {
                self.state
                    .lock()
                    .users
                    .get(user)
                    .map(|u| u.keys.clone())
                    .ok_or_else(|| self.no_such_entity("ListAccessKeys", "user", user))
            })
            .await
    }

    async fn create_policy(
        &self,
        ctx: &CallContext,
        name: &str,
        document: &PolicyDocument,
    ) -> ApiResult<ManagedPolicy> {
        self.harness
            .call(ctx, SERVICE, "CreatePolicy", async {
                let rendered = document.render().map_err(|e| {
                    self.harness.error(
                        SERVICE,
                        "CreatePolicy",
                        "MalformedPolicyDocument",
                        e.to_string(),
                    )
                })?;
                let policy_arn = arn("policy", name);
                let mut state = self.state.lock();
                if state.policies.contains_key(&policy_arn) {
                    return Err(self.already_exists("CreatePolicy", "A policy", name));
                }
                let policy = ManagedPolicy {
                    policy_name: name.to_owned(),
                    arn: policy_arn.clone(),
                    policy_id: Some(self.id("ANPA")),
                    path: Some("/".to_owned()),
                    default_version_id: Some("v1".to_owned()),
                    create_date: Some(Utc::now()),
                };
                state.policies.insert(
                    policy_arn,
                    PolicyEntry {
                        policy: policy.clone(),
                        document: rendered,
                        attachments: 0,
                    },
                );
                Ok(policy)
            })
            .await
    }

    async fn delete_policy(&self, ctx: &CallContext, policy_arn: &str) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DeletePolicy", async {
                let mut state = self.state.lock();
                let entry = state
                    .policies
                    .get(policy_arn)
                    .ok_or_else(|| self.no_such_entity("DeletePolicy", "policy", policy_arn))?;
                if entry.attachments > 0 {
                    return Err(self.delete_conflict(
                        "DeletePolicy",
                        format!("Cannot delete a policy attached to entities: {policy_arn}"),
                    ));
                }
                state.policies.remove(policy_arn);
                Ok(())
            })
            .await
    }

    async fn list_attached_group_policies(
        &self,
        ctx: &CallContext,
        group: &str,
    ) -> ApiResult<Vec<AttachedPolicy>> {
        self.harness
            .call(ctx, SERVICE, "ListAttachedGroupPolicies", async {
                let state = self.state.lock();
                let entry = state.groups.get(group).ok_or_else(|| {
                    self.no_such_entity("ListAttachedGroupPolicies", "group", group)
                })?;
                Ok(attached(&state, &entry.policies))
            })
            .await
    }

    async fn list_attached_user_policies(
        &self,
        ctx: &CallContext,
        user: &str,
    ) -> ApiResult<Vec<AttachedPolicy>> {
        self.harness
            .call(ctx, SERVICE, "ListAttachedUserPolicies", async {
                let state = self.state.lock();
                let entry = state.users.get(user).ok_or_else(|| {
                    self.no_such_entity("ListAttachedUserPolicies", "user", user)
                })?;
                Ok(attached(&state, &entry.policies))
            })
            .await
    }

    async fn attach_group_policy(
        &self,
        ctx: &CallContext,
        group: &str,
        policy_arn: &str,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "AttachGroupPolicy", async {
                let mut state = self.state.lock();
                if !state.policies.contains_key(policy_arn) {
                    return Err(self.no_such_entity("AttachGroupPolicy", "policy", policy_arn));
                }
                let entry = state
                    .groups
                    .get_mut(group)
                    .ok_or_else(|| self.no_such_entity("AttachGroupPolicy", "group", group))?;
                if entry.policies.insert(policy_arn.to_owned()) {
                    if let Some(p) = state.policies.get_mut(policy_arn) {
                        p.attachments += 1;
                    }
                }
                Ok(())
            })
            .await
    }

    async fn detach_group_policy(
        &self,
        ctx: &CallContext,
        group: &str,
        policy_arn: &str,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DetachGroupPolicy", async {
                let mut state = self.state.lock();
                let entry = state
                    .groups
                    .get_mut(group)
                    .ok_or_else(|| self.no_such_entity("DetachGroupPolicy", "group", group))?;
                if !entry.policies.remove(policy_arn) {
                    return Err(self.no_such_entity("DetachGroupPolicy", "policy", policy_arn));
                }
                if let Some(p) = state.policies.get_mut(policy_arn) {
                    p.attachments = p.attachments.saturating_sub(1);
                }
                Ok(())
            })
            .await
    }

    async fn attach_user_policy(
        &self,
        ctx: &CallContext,
        user: &str,
        policy_arn: &str,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "AttachUserPolicy", async {
                let mut state = self.state.lock();
                if !state.policies.contains_key(policy_arn) {
                    return Err(self.no_such_entity("AttachUserPolicy", "policy", policy_arn));
                }
                let entry = state
                    .users
                    .get_mut(user)
                    .ok_or_else(|| self.no_such_entity("AttachUserPolicy", "user", user))?;
                if entry.policies.insert(policy_arn.to_owned()) {
                    if let Some(p) = state.policies.get_mut(policy_arn) {
                        p.attachments += 1;
                    }
                }
                Ok(())
            })
            .await
    }

    async fn detach_user_policy(
        &self,
        ctx: &CallContext,
        user: &str,
        policy_arn: &str,
    ) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DetachUserPolicy", async {
                let mut state = self.state.lock();
                let entry = state
                    .users
                    .get_mut(user)
                    .ok_or_else(|| self.no_such_entity("DetachUserPolicy", "user", user))?;
                if !entry.policies.remove(policy_arn) {
                    return Err(self.no_such_entity("DetachUserPolicy", "policy", policy_arn));
                }
                if let Some(p) = state.policies.get_mut(policy_arn) {
                    p.attachments = p.attachments.saturating_sub(1);
                }
                Ok(())
            })
            .await
    }

    async fn create_group(&self, ctx: &CallContext, name: &str) -> ApiResult<IamGroup> {
        self.harness
            .call(ctx, SERVICE, "CreateGroup", async {
                let mut state = self.state.lock();
                if state.groups.contains_key(name) {
                    return Err(self.already_exists("CreateGroup", "Group", name));
                }
                let group = IamGroup {
                    group_name: name.to_owned(),
                    group_id: self.id("AGPA"),
                    arn: arn("group", name),
                    path: "/".to_owned(),
                    create_date: Some(Utc::now()),
                };
                state.groups.insert(
                    name.to_owned(),
                    GroupEntry {
                        group: group.clone(),
                        members: BTreeSet::new(),
                        policies: BTreeSet::new(),
                    },
                );
                Ok(group)
            })
            .await
    }

    async fn delete_group(&self, ctx: &CallContext, name: &str) -> ApiResult<()> {
        self.harness
            .call(ctx, SERVICE, "DeleteGroup", async {
                let mut state = self.state.lock();
                let entry = state
                    .groups
                    .get(name)
                    .ok_or_else(|| self.no_such_entity("DeleteGroup", "group", name))?;
                if !entry.members.is_empty() || !entry.policies.is_empty() {
                    return Err(self.delete_conflict(
                        "DeleteGroup",
                        format!("Cannot delete entity, must remove users and policies of {name} first."),
                    ));
                }
                state.groups.remove(name);
                Ok(())
            })
            .await
    }

    fn policy_defaults(&self) -> &PolicyDefaults {
        &self.defaults
    }
}
