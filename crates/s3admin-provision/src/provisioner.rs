//! The provisioner of one account.
//!
//! [`Provisioner`] owns the account's gateways and configuration. The
//! workflows themselves live in the private `ops` modules as `impl
//! Provisioner` blocks: composite creations run as a [`Saga`](crate::Saga),
//! deletions clean up best-effort, reads are single calls.

use std::sync::Arc;

use s3admin_core::{AccountConfig, ApiError, ApiResult};
use s3admin_gateway::AccountGateways;
use s3admin_model::output::CleanupError;
use tracing::warn;

use crate::saga::{Saga, SagaStats};

/// Runs the provisioning workflows against one account.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use s3admin_core::{AccountConfig, Backend, CallContext, ErrorClassifier};
/// use s3admin_gateway::MemoryCloud;
/// use s3admin_model::input::{BucketInput, CreateBucketInput};
/// use s3admin_provision::{Provisioner, SagaStats};
///
/// let account = AccountConfig::builder().backend(Backend::Memory).build();
/// let cloud = MemoryCloud::new(&account, ErrorClassifier::default());
/// let provisioner = Provisioner::new("p1", account, cloud.gateways(), Arc::new(SagaStats::default()));
///
/// # tokio_test::block_on(async {
/// let input = CreateBucketInput {
///     bucket_input: BucketInput { bucket: "b1".to_owned() },
///     ..CreateBucketInput::default()
/// };
/// let out = provisioner.create_bucket(&CallContext::default(), input).await.unwrap();
/// assert_eq!(out.group.group_name, "b1-BktAdmGrp");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Provisioner {
    pub(crate) name: String,
    pub(crate) account: Arc<AccountConfig>,
    pub(crate) gateways: AccountGateways,
    pub(crate) stats: Arc<SagaStats>,
}

impl Provisioner {
    /// Create a provisioner for the account `name`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        account: AccountConfig,
        gateways: AccountGateways,
        stats: Arc<SagaStats>,
    ) -> Self {
        Self {
            name: name.into(),
            account: Arc::new(account),
            gateways,
            stats,
        }
    }

    /// Name of the account.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The account configuration.
    #[must_use]
    pub fn account(&self) -> &AccountConfig {
        &self.account
    }

    /// The account's gateways.
    #[must_use]
    pub fn gateways(&self) -> &AccountGateways {
        &self.gateways
    }

    /// Saga counters shared with the rest of the process.
    #[must_use]
    pub fn stats(&self) -> &Arc<SagaStats> {
        &self.stats
    }

    pub(crate) fn saga(&self, workflow: &'static str) -> Saga {
        Saga::new(workflow, Arc::clone(&self.stats))
    }
}

/// Reject empty resource names before any cloud call.
pub(crate) fn require_name(what: &str, code: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{what} must not be empty")).with_code(code));
    }
    Ok(())
}

/// `Ok(None)` for a `NotFound` error, the value otherwise.
pub(crate) fn optional<T>(result: ApiResult<T>) -> ApiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Log a failed best-effort cleanup step and describe it for the response.
pub(crate) fn cleanup_error(step: &str, err: &ApiError) -> CleanupError {
    warn!(step, error = %err, "cleanup step failed");
    CleanupError {
        step: step.to_owned(),
        code: err.code.clone(),
        message: err.message.clone(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;
    use std::sync::Arc;

    use s3admin_core::config::AccessLogConfig;
    use s3admin_core::{AccountConfig, Backend, DomainRegistration, ErrorClassifier};
    use s3admin_gateway::MemoryCloud;

    use super::Provisioner;
    use crate::saga::SagaStats;

    pub(crate) const ZONE: &str = "Z0EXAMPLE";

    pub(crate) fn account() -> AccountConfig {
        AccountConfig::builder()
            .backend(Backend::Memory)
            .domains(HashMap::from([(
                "example.com".to_owned(),
                DomainRegistration {
                    cert_arn: "arn:aws:acm:us-east-1:000000000000:certificate/example".to_owned(),
                    hosted_zone_id: ZONE.to_owned(),
                },
            )]))
            .build()
    }

    pub(crate) fn logged_account() -> AccountConfig {
        let mut account = account();
        account.access_log = Some(AccessLogConfig {
            bucket: "access-logs".to_owned(),
            prefix: Some("s3".to_owned()),
        });
        account
    }

    pub(crate) fn provisioner_for(account: AccountConfig) -> (Provisioner, MemoryCloud) {
        let cloud = MemoryCloud::new(&account, ErrorClassifier::new(false));
        let provisioner = Provisioner::new(
            "test",
            account,
            cloud.gateways(),
            Arc::new(SagaStats::default()),
        );
        (provisioner, cloud)
    }

    pub(crate) fn provisioner() -> (Provisioner, MemoryCloud) {
        provisioner_for(account())
    }
}
