//! HTTP service layer for s3admin.
//!
//! This crate exposes the provisioning workflows as a JSON API over hyper:
//!
//! - [`router`]: maps method and path onto an [`Operation`](router::Operation)
//! - [`auth`]: constant-time `X-Auth-Token` check
//! - [`dispatch`]: the [`AdminHandler`](dispatch::AdminHandler) boundary and
//!   the provisioner-backed implementation
//! - [`response`]: JSON and error encoding
//! - [`metrics`]: Prometheus counters
//! - [`service`]: the hyper `Service` tying it together

pub mod auth;
pub mod body;
pub mod dispatch;
pub mod metrics;
pub mod response;
pub mod router;
pub mod service;

pub use body::AdminResponseBody;
pub use dispatch::{AdminHandler, ProvisionHandler};
pub use metrics::Metrics;
pub use service::{AdminHttpConfig, AdminHttpService};
