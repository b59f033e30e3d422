//! Cloud gateways.
//!
//! One trait per cloud service ([`ObjectGateway`], [`IdentityGateway`],
//! [`CdnGateway`], [`DnsGateway`]), each with two implementations:
//!
//! - [`aws`]: the AWS SDK clients, built per account from static credentials.
//! - [`memory`]: an in-process emulation with fault injection and a call
//!   journal, for tests and local development.
//!
//! Every call takes the request's [`CallContext`](s3admin_core::CallContext)
//! and fails with an [`ApiError`](s3admin_core::ApiError) already classified
//! by the account's [`ErrorClassifier`](s3admin_core::ErrorClassifier).

pub mod aws;
pub mod cdn;
pub mod distribution;
pub mod dns;
pub mod identity;
pub mod memory;
pub mod object;
pub mod policy;

use std::sync::Arc;

use s3admin_core::{AccountConfig, Backend, ErrorClassifier};

pub use cdn::CdnGateway;
pub use dns::DnsGateway;
pub use identity::IdentityGateway;
pub use memory::MemoryCloud;
pub use object::ObjectGateway;

/// The four gateways of one account.
#[derive(Debug, Clone)]
pub struct AccountGateways {
    /// Object storage.
    pub object: Arc<dyn ObjectGateway>,
    /// Identity.
    pub identity: Arc<dyn IdentityGateway>,
    /// Content distribution.
    pub cdn: Arc<dyn CdnGateway>,
    /// DNS.
    pub dns: Arc<dyn DnsGateway>,
}

/// Build the gateways of an account according to its backend.
pub async fn connect(account: &AccountConfig, classifier: ErrorClassifier) -> AccountGateways {
    match account.backend {
        Backend::Aws => aws::connect(account, classifier).await,
        Backend::Memory => MemoryCloud::new(account, classifier).gateways(),
    }
}
