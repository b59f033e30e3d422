//! Provisioning workflows for s3admin.
//!
//! Composite resources are created as a linear saga: every successful cloud
//! call records how to undo it, and the first failure undoes everything
//! recorded so far, newest first.
//!
//! # Architecture
//!
//! ```text
//! Provisioner (one per account)
//!        |
//!        v
//!   ops::{bucket, website, user}  --push-->  Saga (compensation stack)
//!        |
//!        v
//!   AccountGateways (object, identity, cdn, dns)
//! ```

mod ops;
pub mod provisioner;
pub mod saga;

pub use provisioner::Provisioner;
pub use saga::{CLEANUP_PENDING, RollbackReport, Saga, SagaStats};
