//! Names derived from a bucket name.

/// Name of the admin group created for `bucket`.
#[must_use]
pub fn admin_group_name(bucket: &str) -> String {
    format!("{bucket}-BktAdmGrp")
}

/// Name of the admin policy created for `bucket`.
#[must_use]
pub fn admin_policy_name(bucket: &str) -> String {
    format!("{bucket}-BktAdmPlc")
}

/// Name reported for the public-read bucket policy of a website.
#[must_use]
pub fn website_policy_name(bucket: &str) -> String {
    format!("{bucket}-WebPlc")
}

/// Split a website name at its first dot and return the parent label.
///
/// `site.example.com` yields `example.com`. Names without a dot, or with an
/// empty half, have no parent.
#[must_use]
pub fn parent_domain(name: &str) -> Option<&str> {
    let (host, parent) = name.split_once('.')?;
    if host.is_empty() || parent.is_empty() {
        return None;
    }
    Some(parent)
}

/// Canonical access log prefix for `bucket`.
///
/// `Some("logs")` and `Some("/logs/")` both give `logs/<bucket>/`; no prefix
/// (or an empty one) gives `<bucket>/`.
#[must_use]
pub fn logging_prefix(bucket: &str, prefix: Option<&str>) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(p) => format!("{p}/{bucket}/"),
        None => format!("{bucket}/"),
    }
}

/// Whether a policy name belongs to `bucket` (legacy same-named or `<bucket>-…`).
#[must_use]
pub fn owned_by_bucket(policy_name: &str, bucket: &str) -> bool {
    policy_name == bucket
        || policy_name
            .strip_prefix(bucket)
            .is_some_and(|rest| rest.starts_with('-'))
}
