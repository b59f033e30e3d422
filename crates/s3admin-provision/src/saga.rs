//! Compensation stack for multi-step workflows.
//!
//! A workflow pushes one compensation after every forward step that
//! succeeded. When a later step fails, [`Saga::settle`] pops the stack and
//! runs the compensations newest-first under a detached [`CallContext`], so
//! a cancelled request still cleans up after itself. A failing compensation
//! is logged and the unwinding continues; the original error is what the
//! caller sees. A compensation that returns [`CLEANUP_PENDING`] could not
//! finish in time and is reported as pending rather than failed.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use s3admin_core::{ApiError, ApiResult, CallContext};
use tracing::{error, info, warn};

/// Error code of a compensation whose resource is still settling.
pub const CLEANUP_PENDING: &str = "CleanupPending";

/// An undo action. It receives the detached context it must run under.
pub type Compensation = Box<dyn FnOnce(CallContext) -> BoxFuture<'static, ApiResult<()>> + Send>;

/// Outcome of a forward pass, with panics caught.
pub type Outcome<T> = std::thread::Result<ApiResult<T>>;

/// Counters shared by every saga of the process.
#[derive(Debug, Default)]
pub struct SagaStats {
    rollbacks: AtomicU64,
    compensations: AtomicU64,
    compensation_failures: AtomicU64,
    pending_cleanups: AtomicU64,
}

impl SagaStats {
    /// Workflows that were rolled back.
    #[must_use]
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Compensations executed.
    #[must_use]
    pub fn compensations(&self) -> u64 {
        self.compensations.load(Ordering::Relaxed)
    }

    /// Compensations that failed.
    #[must_use]
    pub fn compensation_failures(&self) -> u64 {
        self.compensation_failures.load(Ordering::Relaxed)
    }

    /// Compensations left pending.
    #[must_use]
    pub fn pending_cleanups(&self) -> u64 {
        self.pending_cleanups.load(Ordering::Relaxed)
    }
}

/// A compensation that did not succeed.
#[derive(Debug)]
pub struct CompensationFailure {
    /// Label of the compensation.
    pub label: String,
    /// Why it failed.
    pub error: ApiError,
}

/// What a rollback did.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Labels of the executed compensations, in execution order.
    pub executed: Vec<String>,
    /// Compensations that failed.
    pub failures: Vec<CompensationFailure>,
    /// Labels of compensations that ran out of time waiting on the provider.
    pub pending: Vec<String>,
}

impl RollbackReport {
    /// Whether every compensation finished.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.pending.is_empty()
    }
}

/// Run a forward pass, turning a panic into an [`Outcome`] error.
pub async fn catch<T, F>(forward: F) -> Outcome<T>
where
    F: Future<Output = ApiResult<T>>,
{
    AssertUnwindSafe(forward).catch_unwind().await
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// The compensation stack of one workflow execution.
pub struct Saga {
    workflow: &'static str,
    stats: Arc<SagaStats>,
    steps: Vec<(String, Compensation)>,
}

impl std::fmt::Debug for Saga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saga")
            .field("workflow", &self.workflow)
            .field(
                "steps",
                &self.steps.iter().map(|(label, _)| label).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Saga {
    /// Start an empty stack for `workflow`.
    #[must_use]
    pub fn new(workflow: &'static str, stats: Arc<SagaStats>) -> Self {
        Self {
            workflow,
            stats,
            steps: Vec::new(),
        }
    }

    /// Record the undo action of a step that just succeeded.
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, undo: F)
    where
        F: FnOnce(CallContext) -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<()>> + Send + 'static,
    {
        let label = label.into();
        info!(workflow = self.workflow, step = %label, "step completed");
        self.steps
            .push((label, Box::new(move |ctx| undo(ctx).boxed())));
    }

    /// Number of recorded compensations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every compensation newest-first. Never stops early.
    pub async fn rollback(self, ctx: &CallContext) -> RollbackReport {
        let Self {
            workflow,
            stats,
            mut steps,
        } = self;
        let mut report = RollbackReport::default();
        if steps.is_empty() {
            return report;
        }
        stats.rollbacks.fetch_add(1, Ordering::Relaxed);
        warn!(workflow, steps = steps.len(), "rolling back");

        while let Some((label, undo)) = steps.pop() {
            stats.compensations.fetch_add(1, Ordering::Relaxed);
            let outcome = catch(undo(ctx.detached())).await;
            let result = outcome.unwrap_or_else(|payload| {
                Err(ApiError::internal(format!(
                    "compensation panicked: {}",
                    panic_message(&*payload)
                )))
            });
            match result {
                Ok(()) => info!(workflow, step = %label, "compensation succeeded"),
                Err(err) if err.code == CLEANUP_PENDING => {
                    stats.pending_cleanups.fetch_add(1, Ordering::Relaxed);
                    warn!(workflow, step = %label, error = %err, "compensation pending");
                    report.pending.push(label.clone());
                }
                Err(err) => {
                    stats.compensation_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(workflow, step = %label, error = %err, "compensation failed");
                    report.failures.push(CompensationFailure {
                        label: label.clone(),
                        error: err,
                    });
                }
            }
            report.executed.push(label);
        }
        report
    }

    /// Finish the workflow: keep the work on success, otherwise roll back
    /// and return the forward error. A panic becomes an internal error.
    pub async fn settle<T>(self, ctx: &CallContext, outcome: Outcome<T>) -> ApiResult<T> {
        let workflow = self.workflow;
        let err = match outcome {
            Ok(Ok(value)) => {
                info!(workflow, steps = self.steps.len(), "workflow completed");
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(payload) => {
                let message = panic_message(&*payload).to_owned();
                error!(workflow, panic = %message, "workflow panicked");
                ApiError::internal(format!("{workflow} failed unexpectedly"))
            }
        };
        warn!(workflow, error = %err, "workflow failed");
        let report = self.rollback(ctx).await;
        if !report.is_clean() {
            warn!(
                workflow,
                failed = report.failures.len(),
                pending = report.pending.len(),
                "rollback left resources behind"
            );
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use s3admin_core::ErrorKind;

    use super::*;

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, saga: &mut Saga, label: &str, fail: bool) {
        let log = Arc::clone(log);
        let name = label.to_owned();
        saga.push(label, move |_ctx| async move {
            log.lock().push(name.clone());
            if fail {
                Err(ApiError::internal(format!("{name} failed")))
            } else {
                Ok(())
            }
        });
    }

    #[tokio::test]
    async fn test_should_roll_back_newest_first_and_continue_past_failures() {
        let stats = Arc::new(SagaStats::default());
        let log = recorder();
        let mut saga = Saga::new("test", Arc::clone(&stats));
        record(&log, &mut saga, "one", false);
        record(&log, &mut saga, "two", true);
        record(&log, &mut saga, "three", false);

        let report = saga.rollback(&CallContext::default()).await;

        assert_eq!(*log.lock(), vec!["three", "two", "one"]);
        assert_eq!(report.executed, vec!["three", "two", "one"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label, "two");
        assert_eq!(stats.rollbacks(), 1);
        assert_eq!(stats.compensations(), 3);
        assert_eq!(stats.compensation_failures(), 1);
    }

    #[tokio::test]
    async fn test_should_keep_work_on_success() {
        let stats = Arc::new(SagaStats::default());
        let log = recorder();
        let mut saga = Saga::new("test", Arc::clone(&stats));
        record(&log, &mut saga, "one", false);

        let value = saga
            .settle(&CallContext::default(), Ok(Ok(7)))
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(log.lock().is_empty());
        assert_eq!(stats.rollbacks(), 0);
    }

    #[tokio::test]
    async fn test_should_return_forward_error_after_rollback() {
        let stats = Arc::new(SagaStats::default());
        let log = recorder();
        let mut saga = Saga::new("test", stats);
        record(&log, &mut saga, "one", true);

        let err = saga
            .settle::<()>(
                &CallContext::default(),
                Ok(Err(ApiError::conflict("taken").with_code("BucketAlreadyExists"))),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, "BucketAlreadyExists");
        assert_eq!(*log.lock(), vec!["one"]);
    }

    async fn explode() -> ApiResult<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_should_turn_panic_into_internal_error_and_roll_back() {
        let stats = Arc::new(SagaStats::default());
        let log = recorder();
        let mut saga = Saga::new("test", stats);
        record(&log, &mut saga, "one", false);

        let outcome = catch(explode()).await;
        let err = saga
            .settle(&CallContext::default(), outcome)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InternalError);
        assert_eq!(*log.lock(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_should_run_compensations_when_request_was_cancelled() {
        let stats = Arc::new(SagaStats::default());
        let mut saga = Saga::new("test", stats);
        saga.push("delete user", |ctx: CallContext| async move {
            ctx.run("DeleteUser", async { Ok(()) }).await
        });

        let ctx = CallContext::default();
        ctx.token().cancel();
        let report = saga.rollback(&ctx).await;

        assert!(report.is_clean());
        assert_eq!(report.executed, vec!["delete user"]);
    }

    #[tokio::test]
    async fn test_should_report_pending_cleanup_apart_from_failures() {
        let stats = Arc::new(SagaStats::default());
        let mut saga = Saga::new("test", Arc::clone(&stats));
        saga.push("delete distribution", |_ctx| async {
            Err(ApiError::conflict("still disabling").with_code(CLEANUP_PENDING))
        });

        let report = saga.rollback(&CallContext::default()).await;

        assert!(!report.is_clean());
        assert!(report.failures.is_empty());
        assert_eq!(report.pending, vec!["delete distribution"]);
        assert_eq!(stats.pending_cleanups(), 1);
        assert_eq!(stats.compensation_failures(), 0);
    }
}
