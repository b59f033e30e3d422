//! Shared foundations of the s3admin provisioning service.
//!
//! - [`error`]: the seven-kind error taxonomy and [`ApiError`].
//! - [`classify`]: maps provider error codes onto the taxonomy.
//! - [`config`]: JSON configuration with environment overrides.
//! - [`naming`]: derived resource names (admin group, policy, log prefix).
//! - [`context`]: per-call cancellation and deadline.

pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod naming;

pub use classify::{CloudService, ErrorClassifier};
pub use config::{AccountConfig, AppConfig, Backend, ConfigError, DomainRegistration};
pub use context::CallContext;
pub use error::{ApiError, ApiResult, ErrorKind};
