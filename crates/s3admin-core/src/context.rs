//! Per-request call context.
//!
//! A [`CallContext`] carries the request's cancellation signal and deadline
//! into every cloud call. [`CallContext::run`] races a call against both, so
//! a client disconnect or an expired deadline fails the in-flight call and
//! the workflow unwinds like on any other failure.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Default per-request budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Cancellation signal and deadline shared by the calls of one request.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Instant,
    budget: Duration,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl CallContext {
    /// Create a context bound to `cancel` that expires after `budget`.
    #[must_use]
    pub fn new(cancel: CancellationToken, budget: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + budget,
            budget,
        }
    }

    /// Create a context with its own cancellation token.
    #[must_use]
    pub fn with_timeout(budget: Duration) -> Self {
        Self::new(CancellationToken::new(), budget)
    }

    /// A context for compensations: not cancelled with the request, and with
    /// a fresh deadline of the same budget.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::with_timeout(self.budget)
    }

    /// The cancellation token of this context.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Run one cloud call named `operation` under this context.
    ///
    /// ```
    /// use s3admin_core::{ApiError, CallContext};
    ///
    /// # tokio_test::block_on(async {
    /// let ctx = CallContext::default();
    /// let value = ctx.run("GetUser", async { Ok::<_, ApiError>("alice") }).await.unwrap();
    /// assert_eq!(value, "alice");
    ///
    /// ctx.token().cancel();
    /// let err = ctx.run("GetUser", async { Ok::<_, ApiError>("alice") }).await.unwrap_err();
    /// assert_eq!(err.code, "RequestCancelled");
    /// # });
    /// ```
    pub async fn run<T, F>(&self, operation: &str, call: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        debug!(operation, "cloud call");
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ApiError::cancelled(operation)),
            () = tokio::time::sleep_until(self.deadline) => Err(ApiError::request_timeout(operation)),
            result = call => result,
        }
    }
}
