//! Route 53 gateway.

use async_trait::async_trait;
use aws_sdk_route53::Client;
use aws_sdk_route53::types as r53;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use s3admin_core::{ApiError, ApiResult, CallContext, CloudService, ErrorClassifier};
use s3admin_model::{AliasTarget, ChangeInfo, RecordSet};

use super::{build_error, sdk_error, to_chrono};
use crate::dns::DnsGateway;

/// [`DnsGateway`] over the Route 53 API.
#[derive(Debug, Clone)]
pub struct AwsDnsGateway {
    client: Client,
    classifier: ErrorClassifier,
}

impl AwsDnsGateway {
    /// Wrap a Route 53 client.
    #[must_use]
    pub fn new(client: Client, classifier: ErrorClassifier) -> Self {
        Self { client, classifier }
    }

    fn error<E>(&self, context: &str, err: SdkError<E, HttpResponse>) -> ApiError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        sdk_error(&self.classifier, CloudService::Dns, context, err)
    }

    async fn change(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        action: r53::ChangeAction,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo> {
        const CONTEXT: &str = "ChangeResourceRecordSets";
        let batch = to_record_set(record)
            .and_then(|rrset| {
                r53::Change::builder()
                    .action(action)
                    .resource_record_set(rrset)
                    .build()
            })
            .and_then(|change| r53::ChangeBatch::builder().changes(change).build())
            .map_err(|e| build_error(CONTEXT, e))?;
        ctx.run(CONTEXT, async {
            let out = self
                .client
                .change_resource_record_sets()
                .hosted_zone_id(zone_id)
                .change_batch(batch)
                .send()
                .await
                .map_err(|e| self.error(CONTEXT, e))?;
            let info = out
                .change_info()
                .ok_or_else(|| ApiError::internal(format!("{CONTEXT}: response has no change")))?;
            Ok(ChangeInfo {
                id: info.id().to_owned(),
                status: info.status().as_str().to_owned(),
                submitted_at: to_chrono(info.submitted_at()),
                comment: info.comment().map(str::to_owned),
            })
        })
        .await
    }
}

fn to_record_set(
    record: &RecordSet,
) -> Result<r53::ResourceRecordSet, aws_smithy_types::error::operation::BuildError> {
    let alias = record
        .alias_target
        .as_ref()
        .map(|a| {
            r53::AliasTarget::builder()
                .hosted_zone_id(&a.hosted_zone_id)
                .dns_name(&a.dns_name)
                .evaluate_target_health(a.evaluate_target_health)
                .build()
        })
        .transpose()?;
    let values = record
        .resource_records
        .iter()
        .map(|v| r53::ResourceRecord::builder().value(v).build())
        .collect::<Result<Vec<_>, _>>()?;

    r53::ResourceRecordSet::builder()
        .name(&record.name)
        .r#type(r53::RrType::from(record.record_type.as_str()))
        .set_ttl(record.ttl)
        .set_alias_target(alias)
        .set_resource_records((!values.is_empty()).then_some(values))
        .build()
}

fn from_record_set(rrset: &r53::ResourceRecordSet) -> RecordSet {
    RecordSet {
        name: rrset.name().to_owned(),
        record_type: rrset.r#type().as_str().to_owned(),
        ttl: rrset.ttl(),
        alias_target: rrset.alias_target().map(|a| AliasTarget {
            hosted_zone_id: a.hosted_zone_id().to_owned(),
            dns_name: a.dns_name().to_owned(),
            evaluate_target_health: a.evaluate_target_health(),
        }),
        resource_records: rrset
            .resource_records()
            .iter()
            .map(|r| r.value().to_owned())
            .collect(),
    }
}

#[async_trait]
impl DnsGateway for AwsDnsGateway {
    async fn create_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo> {
        self.change(ctx, zone_id, r53::ChangeAction::Create, record)
            .await
    }

    async fn delete_record(
        &self,
        ctx: &CallContext,
        zone_id: &str,
        record: &RecordSet,
    ) -> ApiResult<ChangeInfo> {
        self.change(ctx, zone_id, r53::ChangeAction::Delete, record)
            .await
    }

    async fn list_records(&self, ctx: &CallContext, zone_id: &str) -> ApiResult<Vec<RecordSet>> {
        ctx.run("ListResourceRecordSets", async {
            let mut records = Vec::new();
            let mut next_name: Option<String> = None;
            let mut next_type: Option<r53::RrType> = None;
            loop {
                let out = self
                    .client
                    .list_resource_record_sets()
                    .hosted_zone_id(zone_id)
                    .set_start_record_name(next_name.take())
                    .set_start_record_type(next_type.take())
                    .send()
                    .await
                    .map_err(|e| self.error("ListResourceRecordSets", e))?;
                records.extend(out.resource_record_sets().iter().map(from_record_set));
                if !out.is_truncated() {
                    break;
                }
                next_name = out.next_record_name().map(str::to_owned);
                next_type = out.next_record_type().cloned();
                if next_name.is_none() {
                    break;
                }
            }
            Ok(records)
        })
        .await
    }
}
