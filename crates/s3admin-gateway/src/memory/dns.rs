//! In-memory DNS zones.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService};
use s3admin_model::{ChangeInfo, RecordSet};
use tracing::info;

use super::Harness;
use crate::dns::DnsGateway;

const SERVICE: CloudService = CloudService::Dns;

/// [`DnsGateway`] holding the record sets of each hosted zone.
#[derive(Debug)]
pub struct MemoryDnsGateway {
    harness: Arc<Harness>,
    zones: DashMap<String, Vec<RecordSet>>,
}

impl MemoryDnsGateway {
    pub(crate) fn new(harness: Arc<Harness>, zones: impl Iterator<Item = String>) -> Self {
        Self {
            harness,
            zones: zones.map(|zone| (zone, Vec::new())).collect(),
        }
    }

    fn no_such_zone(&self, operation: &str, zone_id: &str) -> ApiError {
        self.harness.error(
            SERVICE,
            operation,
            "NoSuchHostedZone",
            format!("No hosted zone found with ID: {zone_id}"),
        )
    }

    fn invalid_batch(&self, message: String) -> ApiError {
        self.harness.error(
            SERVICE,
            "ChangeResourceRecordSets",
            "InvalidChangeBatch",
            message,
        )
    }

    fn change_info(&self) -> ChangeInfo {
        ChangeInfo {
            id: format!("/change/C{:013X}", self.harness.next_id()),
            status: "PENDING".to_owned(),
            submitted_at: Some(Utc::now()),
            comment: None,
        }
    }

    /// Record sets of a zone.
    #[must_use]
    pub fn records(&self, zone_id: &str) -> Vec<RecordSet> {
        self.zones
            .get(zone_id)
            .map(|z| z.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DnsGateway for MemoryDnsGateway {
    async fn create_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo> {
        self.harness
            .call(ctx, SERVICE, "ChangeResourceRecordSets", async {
                let mut zone = self
                    .zones
                    .get_mut(zone_id)
                    .ok_or_else(|| self.no_such_zone("ChangeResourceRecordSets", zone_id))?;
                if zone
                    .iter()
                    .any(|r| r.matches(&record.name, &record.record_type))
                {
                    return Err(self.invalid_batch(format!(
                        "Tried to create resource record set [name='{}', type='{}'] but it already exists",
                        record.name, record.record_type
                    )));
                }
                zone.push(record.clone());
                info!(zone = zone_id, name = %record.name, "record created");
                Ok(self.change_info())
            })
            .await
    }

    async fn delete_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo> {
        self.harness
            .call(ctx, SERVICE, "ChangeResourceRecordSets", async {
                let mut zone = self
                    .zones
                    .get_mut(zone_id)
                    .ok_or_else(|| self.no_such_zone("ChangeResourceRecordSets", zone_id))?;
                let Some(index) = zone.iter().position(|r| r == record) else {
                    return Err(self.invalid_batch(format!(
                        "Tried to delete resource record set [name='{}', type='{}'] but it was not found",
                        record.name, record.record_type
                    )));
                };
                zone.remove(index);
                info!(zone = zone_id, name = %record.name, "record deleted");
                Ok(self.change_info())
            })
            .await
    }

    async fn list_records(&self, ctx: &CallContext, zone_id: &str) -> ApiResult<Vec<RecordSet>> {
        self.harness
            .call(ctx, SERVICE, "ListResourceRecordSets", async {
                self.zones
                    .get(zone_id)
                    .map(|z| z.clone())
                    .ok_or_else(|| self.no_such_zone("ListResourceRecordSets", zone_id))
            })
            .await
    }
}
