//! Workflow implementations, grouped by resource.

mod bucket;
mod user;
mod website;
