//! Wire and domain types for the s3admin provisioning API.
//!
//! All JSON uses `PascalCase` field naming, matching the AWS APIs the
//! service fronts. Optional fields are omitted when `None` and unknown
//! request fields are ignored, so clients can send richer payloads without
//! breaking.
//!
//! - [`types`]: domain values shared by the cloud gateways and responses
//! - [`input`]: request bodies
//! - [`output`]: response bodies

pub mod input;
pub mod output;
pub mod types;

pub use types::*;
