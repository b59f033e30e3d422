//! In-memory gateways.
//!
//! [`MemoryCloud`] emulates the four services of one account in process. It
//! enforces the provider rules the workflows depend on (bucket must be empty
//! to delete, groups and users must be detached before deletion, a
//! distribution must be disabled and deployed before deletion, version tags
//! must match) and reports violations with the provider's error codes, so
//! errors go through the same [`ErrorClassifier`] as the AWS backend.
//!
//! Tests script failures with [`MemoryCloud::fail_next`] and inspect the
//! order of calls with [`MemoryCloud::journal`].

mod cdn;
mod dns;
mod identity;
mod object;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use s3admin_core::{AccountConfig, ApiError, ApiResult, CallContext, CloudService, ErrorClassifier};

pub use cdn::MemoryCdnGateway;
pub use dns::MemoryDnsGateway;
pub use identity::MemoryIdentityGateway;
pub use object::MemoryObjectGateway;

use crate::AccountGateways;
use crate::distribution::WebsiteDefaults;
use crate::policy::PolicyDefaults;

/// Account ID used in emulated ARNs.
pub const MEMORY_ACCOUNT_ID: &str = "000000000000";

/// Fault queue and call journal shared by the gateways of one [`MemoryCloud`].
#[derive(Debug)]
pub(crate) struct Harness {
    classifier: ErrorClassifier,
    faults: DashMap<String, VecDeque<String>>,
    journal: Mutex<Vec<String>>,
    sequence: AtomicU64,
}

impl Harness {
    fn new(classifier: ErrorClassifier) -> Self {
        Self {
            classifier,
            faults: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(1),
        }
    }

    /// Run one emulated call: record it, fail it if a fault is queued, and
    /// otherwise evaluate `body` under the call context.
    pub(crate) async fn call<T, F>(
        &self,
        ctx: &CallContext,
        service: CloudService,
        operation: &'static str,
        body: F,
    ) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        ctx.run(operation, async {
            self.journal.lock().push(operation.to_owned());
            if let Some(code) = self.take_fault(operation) {
                return Err(self.classifier.classify(
                    service,
                    operation,
                    &code,
                    Some("injected fault"),
                ));
            }
            body.await
        })
        .await
    }

    /// A provider error with `code`, classified like a real response.
    pub(crate) fn error(
        &self,
        service: CloudService,
        operation: &str,
        code: &str,
        message: impl Into<String>,
    ) -> ApiError {
        let message = message.into();
        self.classifier
            .classify(service, operation, code, Some(&message))
    }

    /// Next value of a process-wide sequence, for IDs.
    pub(crate) fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn take_fault(&self, operation: &str) -> Option<String> {
        let mut queue = self.faults.get_mut(operation)?;
        queue.pop_front()
    }
}

/// In-memory emulation of the cloud services of one account.
///
/// # Examples
///
/// ```
/// use s3admin_core::{AccountConfig, Backend, CallContext, ErrorClassifier};
/// use s3admin_gateway::{MemoryCloud, ObjectGateway};
///
/// let account = AccountConfig::builder().backend(Backend::Memory).build();
/// let cloud = MemoryCloud::new(&account, ErrorClassifier::default());
/// cloud.fail_next("CreateBucket", "SlowDown");
/// assert!(cloud.journal().is_empty());
///
/// # tokio_test::block_on(async {
/// let ctx = CallContext::default();
/// let err = cloud.object().create_bucket(&ctx, "b1", "us-east-1").await.unwrap_err();
/// assert_eq!(err.code, "SlowDown");
/// assert_eq!(cloud.journal(), vec!["CreateBucket"]);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryCloud {
    harness: Arc<Harness>,
    object: Arc<MemoryObjectGateway>,
    identity: Arc<MemoryIdentityGateway>,
    cdn: Arc<MemoryCdnGateway>,
    dns: Arc<MemoryDnsGateway>,
}

impl MemoryCloud {
    /// Create an empty cloud for `account`. A hosted zone exists for every
    /// configured domain.
    #[must_use]
    pub fn new(account: &AccountConfig, classifier: ErrorClassifier) -> Self {
        let harness = Arc::new(Harness::new(classifier));
        let zones = account
            .domains
            .values()
            .map(|d| d.hosted_zone_id.clone());
        Self {
            object: Arc::new(MemoryObjectGateway::new(Arc::clone(&harness))),
            identity: Arc::new(MemoryIdentityGateway::new(
                Arc::clone(&harness),
                PolicyDefaults::from_account(account),
            )),
            cdn: Arc::new(MemoryCdnGateway::new(
                Arc::clone(&harness),
                WebsiteDefaults::from_account(account),
            )),
            dns: Arc::new(MemoryDnsGateway::new(Arc::clone(&harness), zones)),
            harness,
        }
    }

    /// Fail the next call of `operation` (e.g. `CreatePolicy`) with the
    /// provider error `code`. Faults for one operation queue up.
    pub fn fail_next(&self, operation: &str, code: &str) {
        self.harness
            .faults
            .entry(operation.to_owned())
            .or_default()
            .push_back(code.to_owned());
    }

    /// Operations called so far, oldest first.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.harness.journal.lock().clone()
    }

    /// Forget the recorded calls.
    pub fn clear_journal(&self) {
        self.harness.journal.lock().clear();
    }

    /// The object storage emulation.
    #[must_use]
    pub fn object(&self) -> &Arc<MemoryObjectGateway> {
        &self.object
    }

    /// The identity emulation.
    #[must_use]
    pub fn identity(&self) -> &Arc<MemoryIdentityGateway> {
        &self.identity
    }

    /// The CDN emulation.
    #[must_use]
    pub fn cdn(&self) -> &Arc<MemoryCdnGateway> {
        &self.cdn
    }

    /// The DNS emulation.
    #[must_use]
    pub fn dns(&self) -> &Arc<MemoryDnsGateway> {
        &self.dns
    }

    /// The emulations as trait objects.
    #[must_use]
    pub fn gateways(&self) -> AccountGateways {
        AccountGateways {
            object: self.object.clone(),
            identity: self.identity.clone(),
            cdn: self.cdn.clone(),
            dns: self.dns.clone(),
        }
    }
}
