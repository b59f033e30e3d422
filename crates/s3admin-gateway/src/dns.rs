//! DNS gateway.

use std::fmt;

use async_trait::async_trait;
use s3admin_core::{ApiError, ApiResult, CallContext};
use s3admin_model::{ChangeInfo, RecordSet};

/// Record set operations of the authoritative DNS service.
#[async_trait]
pub trait DnsGateway: Send + Sync + fmt::Debug {
    /// Create a record set.
    async fn create_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo>;

    /// Delete a record set; `record` must match the stored one exactly.
    async fn delete_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo>;

    /// All record sets of a zone, following pagination.
    async fn list_records(&self, ctx: &CallContext, zone_id: &str) -> ApiResult<Vec<RecordSet>>;

    /// The record set for `host` and `record_type`, or `NotFound`.
    async fn get_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        host: &str,
        record_type: &str,
    ) -> ApiResult<RecordSet> {
        self.list_records(ctx, zone_id)
            .await?
            .into_iter()
            .find(|r| r.matches(host, record_type))
            .ok_or_else(|| {
                ApiError::not_found(format!("no {record_type} record for {host}"))
                    .with_code("NoSuchRecord")
            })
    }
}
