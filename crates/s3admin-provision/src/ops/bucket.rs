//! Bucket workflows.
//!
//! Bucket-Create provisions the bucket, its admin policy and its admin group
//! as one unit. Bucket-Delete removes the bucket first and then the group
//! and policy best-effort, reporting what it could not remove.

use std::sync::Arc;

use s3admin_core::{ApiError, ApiResult, CallContext, naming};
use s3admin_model::input::{CreateBucketInput, UpdateTagsInput};
use s3admin_model::output::{
    CreateBucketOutput, DeleteBucketOutput, ListBucketsOutput, ShowBucketOutput, UpdateTagsOutput,
};
use tracing::{debug, info};

use crate::provisioner::{Provisioner, cleanup_error, require_name};
use crate::saga::{self, Saga};

/// Keys listed when deciding whether a bucket is empty.
const EMPTY_PROBE_KEYS: i32 = 1000;

impl Provisioner {
    /// List the account's buckets.
    pub async fn list_buckets(&self, ctx: &CallContext) -> ApiResult<ListBucketsOutput> {
        let buckets = self.gateways.object.list_buckets(ctx).await?;
        Ok(ListBucketsOutput { buckets })
    }

    /// Whether a bucket exists.
    pub async fn bucket_exists(&self, ctx: &CallContext, name: &str) -> ApiResult<bool> {
        self.gateways.object.bucket_exists(ctx, name).await
    }

    /// Tags, logging target and emptiness of a bucket. Folder placeholder
    /// keys (ending in `/`) do not count as content.
    pub async fn show_bucket(&self, ctx: &CallContext, name: &str) -> ApiResult<ShowBucketOutput> {
        let object = &self.gateways.object;
        let tags = object.get_bucket_tags(ctx, name).await?;
        let logging = object.get_bucket_logging(ctx, name).await?;
        let empty = object
            .bucket_empty_with_filter(ctx, name, EMPTY_PROBE_KEYS, &|key: &str| {
                !key.ends_with('/')
            })
            .await?;
        Ok(ShowBucketOutput {
            tags,
            logging,
            empty,
            ..ShowBucketOutput::default()
        })
    }

    /// Replace the tag set of a bucket.
    pub async fn update_bucket_tags(
        &self,
        ctx: &CallContext,
        name: &str,
        input: UpdateTagsInput,
    ) -> ApiResult<UpdateTagsOutput> {
        self.gateways
            .object
            .put_bucket_tags(ctx, name, &input.tags)
            .await?;
        info!(account = %self.name, bucket = name, tags = input.tags.len(), "bucket tags updated");
        Ok(UpdateTagsOutput {
            tags: input.tags,
            distribution_id: None,
        })
    }

    /// Bucket-Create: bucket, tags, optional encryption and access logging,
    /// admin policy, admin group, policy attachment. An existing bucket is a
    /// conflict before anything is created; any later failure undoes the
    /// steps already taken.
    pub async fn create_bucket(
        &self,
        ctx: &CallContext,
        input: CreateBucketInput,
    ) -> ApiResult<CreateBucketOutput> {
        require_name("bucket name", "InvalidBucketName", &input.bucket_input.bucket)?;
        let mut saga = self.saga("bucket-create");
        let outcome = saga::catch(self.create_bucket_steps(ctx, &mut saga, &input, false)).await;
        saga.settle(ctx, outcome).await
    }

    /// The forward steps shared by bucket and website creation.
    pub(crate) async fn create_bucket_steps(
        &self,
        ctx: &CallContext,
        saga: &mut Saga,
        input: &CreateBucketInput,
        website: bool,
    ) -> ApiResult<CreateBucketOutput> {
        let name = input.bucket_input.bucket.as_str();
        let object = Arc::clone(&self.gateways.object);
        let identity = Arc::clone(&self.gateways.identity);

        if object.bucket_exists(ctx, name).await? {
            return Err(ApiError::conflict(format!("bucket {name} already exists"))
                .with_code("BucketAlreadyExists"));
        }
        let location = object.create_bucket(ctx, name, &self.account.region).await?;
        {
            let object = Arc::clone(&object);
            let bucket = name.to_owned();
            saga.push(format!("delete bucket {name}"), move |ctx| async move {
                object.delete_empty_bucket(&ctx, &bucket).await
            });
        }

        object.put_bucket_tags(ctx, name, &input.tags).await?;
        if let Some(encryption) = &input.server_side_encryption {
            object.put_bucket_encryption(ctx, name, encryption).await?;
        }
        if let Some(log) = &self.account.access_log {
            object
                .put_bucket_logging(ctx, name, &log.bucket, log.prefix.as_deref())
                .await?;
        }

        if website {
            let config = input.website_configuration.clone().unwrap_or_default();
            object.put_website_config(ctx, name, &config).await?;
            let public_read = identity.default_website_access_policy(name);
            object.put_bucket_policy(ctx, name, &public_read).await?;
        }

        let document = if website {
            identity.default_website_admin_policy(name)
        } else {
            identity.default_bucket_admin_policy(name)
        };
        let policy_name = naming::admin_policy_name(name);
        let policy = identity.create_policy(ctx, &policy_name, &document).await?;
        {
            let identity = Arc::clone(&identity);
            let arn = policy.arn.clone();
            saga.push(format!("delete policy {policy_name}"), move |ctx| async move {
                identity.delete_policy(&ctx, &arn).await
            });
        }

        let group_name = naming::admin_group_name(name);
        let group = identity.create_group(ctx, &group_name).await?;
        {
            let identity = Arc::clone(&identity);
            let group = group_name.clone();
            saga.push(format!("delete group {group_name}"), move |ctx| async move {
                identity.delete_group(&ctx, &group).await
            });
        }

        identity
            .attach_group_policy(ctx, &group_name, &policy.arn)
            .await?;
        {
            let identity = Arc::clone(&identity);
            let group = group_name.clone();
            let arn = policy.arn.clone();
            saga.push(
                format!("detach policy {policy_name} from {group_name}"),
                move |ctx| async move { identity.detach_group_policy(&ctx, &group, &arn).await },
            );
        }

        info!(account = %self.name, bucket = name, %location, "bucket provisioned");
        Ok(CreateBucketOutput {
            bucket: location,
            policy,
            group,
            distribution: None,
            dns_change: None,
        })
    }

    /// Bucket-Delete: the bucket must be empty. Once it is gone, the admin
    /// group is emptied and deleted; failures of those steps are reported in
    /// the output instead of failing the request.
    pub async fn delete_bucket(&self, ctx: &CallContext, name: &str) -> ApiResult<DeleteBucketOutput> {
        require_name("bucket name", "InvalidBucketName", name)?;
        self.gateways.object.delete_empty_bucket(ctx, name).await?;
        info!(account = %self.name, bucket = name, "bucket deleted");

        let mut out = DeleteBucketOutput {
            bucket: name.to_owned(),
            ..DeleteBucketOutput::default()
        };
        self.remove_admin_group(ctx, name, &mut out, false).await;
        Ok(out)
    }

    /// Detach and delete the admin policies, remove the members and delete
    /// the admin group of `name`. With `tolerate_missing`, an absent group is
    /// not an error.
    pub(crate) async fn remove_admin_group(
        &self,
        ctx: &CallContext,
        name: &str,
        out: &mut DeleteBucketOutput,
        tolerate_missing: bool,
    ) {
        let identity = &self.gateways.identity;
        let group = naming::admin_group_name(name);

        let policies = match identity.list_attached_group_policies(ctx, &group).await {
            Ok(policies) => policies,
            Err(err) if tolerate_missing && err.is_not_found() => {
                debug!(group = %group, "admin group already removed");
                return;
            }
            Err(err) => {
                out.errors
                    .push(cleanup_error("ListAttachedGroupPolicies", &err));
                return;
            }
        };

        for policy in policies {
            if let Err(err) = identity
                .detach_group_policy(ctx, &group, &policy.policy_arn)
                .await
            {
                out.errors.push(cleanup_error("DetachGroupPolicy", &err));
                continue;
            }
            out.detached_policies.push(policy.policy_name.clone());

            if naming::owned_by_bucket(&policy.policy_name, name) {
                match identity.delete_policy(ctx, &policy.policy_arn).await {
                    Ok(()) => out.deleted_policies.push(policy.policy_name),
                    Err(err) => out.errors.push(cleanup_error("DeletePolicy", &err)),
                }
            }
        }

        match identity.list_group_users(ctx, &group).await {
            Ok(users) => {
                for user in users {
                    match identity
                        .remove_user_from_group(ctx, &user.user_name, &group)
                        .await
                    {
                        Ok(()) => out.removed_users.push(user.user_name),
                        Err(err) => out.errors.push(cleanup_error("RemoveUserFromGroup", &err)),
                    }
                }
            }
            Err(err) => out.errors.push(cleanup_error("GetGroup", &err)),
        }

        match identity.delete_group(ctx, &group).await {
            Ok(()) => info!(group = %group, "admin group deleted"),
            Err(err) => out.errors.push(cleanup_error("DeleteGroup", &err)),
        }
    }
}
