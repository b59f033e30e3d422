//! In-process counters rendered in the Prometheus text format.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use s3admin_provision::SagaStats;

/// Label used for requests that matched no route.
pub const UNROUTED: &str = "Unrouted";

/// Request counters by operation and status, plus the saga counters.
#[derive(Debug)]
pub struct Metrics {
    requests: DashMap<(&'static str, u16), AtomicU64>,
    sagas: Arc<SagaStats>,
}

impl Metrics {
    /// Create an empty registry reporting `sagas` alongside the requests.
    #[must_use]
    pub fn new(sagas: Arc<SagaStats>) -> Self {
        Self {
            requests: DashMap::new(),
            sagas,
        }
    }

    /// Count one served request.
    pub fn record(&self, operation: &'static str, status: http::StatusCode) {
        self.requests
            .entry((operation, status.as_u16()))
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Requests served for `operation` with `status`.
    #[must_use]
    pub fn requests(&self, operation: &'static str, status: http::StatusCode) -> u64 {
        self.requests
            .get(&(operation, status.as_u16()))
            .map_or(0, |n| n.load(Ordering::Relaxed))
    }

    /// Render every counter.
    #[must_use]
    pub fn render(&self) -> String {
        let requests: BTreeMap<(&'static str, u16), u64> = self
            .requests
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();

        let mut out = String::new();
        out.push_str("# HELP s3admin_requests_total Requests served, by operation and status.\n");
        out.push_str("# TYPE s3admin_requests_total counter\n");
        for ((operation, status), n) in requests {
            let _ = writeln!(
                out,
                "s3admin_requests_total{{operation=\"{operation}\",status=\"{status}\"}} {n}"
            );
        }

        counter(
            &mut out,
            "s3admin_saga_rollbacks_total",
            "Workflows rolled back after a failed step.",
            self.sagas.rollbacks(),
        );
        counter(
            &mut out,
            "s3admin_saga_compensations_total",
            "Compensations executed during rollbacks.",
            self.sagas.compensations(),
        );
        counter(
            &mut out,
            "s3admin_saga_compensation_failures_total",
            "Compensations that failed.",
            self.sagas.compensation_failures(),
        );
        counter(
            &mut out,
            "s3admin_saga_pending_cleanups_total",
            "Compensations left waiting on the provider.",
            self.sagas.pending_cleanups(),
        );
        out
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_count_requests_by_operation_and_status() {
        let metrics = Metrics::new(Arc::new(SagaStats::default()));
        metrics.record("CreateBucket", http::StatusCode::OK);
        metrics.record("CreateBucket", http::StatusCode::OK);
        metrics.record("CreateBucket", http::StatusCode::CONFLICT);

        assert_eq!(metrics.requests("CreateBucket", http::StatusCode::OK), 2);
        assert_eq!(metrics.requests("CreateBucket", http::StatusCode::CONFLICT), 1);
        assert_eq!(metrics.requests("DeleteBucket", http::StatusCode::OK), 0);
    }

    #[test]
    fn test_should_render_prometheus_text() {
        let metrics = Metrics::new(Arc::new(SagaStats::default()));
        metrics.record("Ping", http::StatusCode::OK);
        metrics.record(UNROUTED, http::StatusCode::NOT_FOUND);

        let text = metrics.render();

        assert!(text.contains("# TYPE s3admin_requests_total counter"));
        assert!(text.contains("s3admin_requests_total{operation=\"Ping\",status=\"200\"} 1"));
        assert!(text.contains("s3admin_requests_total{operation=\"Unrouted\",status=\"404\"} 1"));
        assert!(text.contains("s3admin_saga_rollbacks_total 0"));
        assert!(text.contains("s3admin_saga_compensation_failures_total 0"));
        assert!(text.contains("s3admin_saga_pending_cleanups_total 0"));
        let ping = text.find("operation=\"Ping\"").unwrap();
        let unrouted = text.find("operation=\"Unrouted\"").unwrap();
        assert!(ping < unrouted);
    }
}
