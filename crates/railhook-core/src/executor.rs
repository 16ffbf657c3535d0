//! Idempotency/retry executor.
//!
//! Wraps one downstream call in a bounded exponential-backoff loop. Failures
//! are classified by message:
//!
//! - retryable failures are retried while the policy allows it,
//! - terminal failures stop the loop immediately,
//! - "already processed" failures end the loop as a successful no-op.
//!
//! The executor keeps no record of the events it has seen. Duplicate
//! deliveries become no-ops only because the downstream operation reports
//! them as already processed.
//!
//! Sleeps between attempts race against the request's cancellation token,
//! and a retry whose delay would run past the request deadline is never
//! started. A call that is already in flight is left to finish.

use crate::classifier::{ErrorClass, ErrorClassifier};
use crate::downstream::DownstreamError;
use crate::retry::RetryPolicy;
use crate::ErrorCategory;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Execution Context
// ============================================================================

/// Per-request cancellation signal and deadline.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// Context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context bound to an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn would_cross_deadline(&self, delay: Duration) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() + delay >= deadline)
    }
}

// ============================================================================
// Outcomes and Errors
// ============================================================================

/// Successful end of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The downstream call succeeded.
    Applied { attempts: u32 },
    /// The downstream operation reported the effect as already applied.
    AlreadyProcessed { attempts: u32 },
}

impl ExecutionOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Applied { attempts } | Self::AlreadyProcessed { attempts } => *attempts,
        }
    }

    pub fn is_already_processed(&self) -> bool {
        matches!(self, Self::AlreadyProcessed { .. })
    }
}

/// Failed end of an execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Terminal {
        operation: String,
        attempts: u32,
        #[source]
        source: DownstreamError,
    },

    #[error("{operation} still failing after {attempts} attempt(s): {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: DownstreamError,
    },

    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled {
        operation: String,
        attempts: u32,
        last_error: Option<DownstreamError>,
    },

    #[error("{operation} stopped at request deadline after {attempts} attempt(s)")]
    DeadlineExceeded {
        operation: String,
        attempts: u32,
        last_error: Option<DownstreamError>,
    },
}

impl ExecutionError {
    /// Downstream calls made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Terminal { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    /// Most recent downstream failure, if any call was made.
    pub fn last_error(&self) -> Option<&DownstreamError> {
        match self {
            Self::Terminal { source, .. } | Self::Exhausted { source, .. } => Some(source),
            Self::Cancelled { last_error, .. } | Self::DeadlineExceeded { last_error, .. } => {
                last_error.as_ref()
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Terminal { .. } => ErrorCategory::Terminal,
            _ => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Runs downstream operations under a [`RetryPolicy`] and [`ErrorClassifier`].
///
/// Immutable after construction and shared by every adapter.
///
/// # Examples
///
/// ```rust
/// use railhook_core::{DownstreamError, ExecutionContext, RetryExecutor, RetryPolicy, ErrorClassifier};
///
/// # tokio_test::block_on(async {
/// let executor = RetryExecutor::new(RetryPolicy::default(), ErrorClassifier::default());
/// let ctx = ExecutionContext::new();
///
/// let outcome = executor
///     .execute("credit_deposit", &ctx, || async {
///         Err::<(), _>(DownstreamError::new("deposit already processed"))
///     })
///     .await
///     .unwrap();
///
/// assert!(outcome.is_already_processed());
/// assert_eq!(outcome.attempts(), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    classifier: ErrorClassifier,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, classifier: ErrorClassifier) -> Self {
        Self { policy, classifier }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Call `op` until it succeeds, fails terminally, or the budget runs out.
    ///
    /// `operation` names the call in logs and errors.
    pub async fn execute<F, Fut>(
        &self,
        operation: &str,
        ctx: &ExecutionContext,
        mut op: F,
    ) -> Result<ExecutionOutcome, ExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), DownstreamError>>,
    {
        let mut attempts: u32 = 0;
        let mut last_error: Option<DownstreamError> = None;

        loop {
            if ctx.is_cancelled() {
                warn!(operation, attempts, "Request cancelled - stopping retries");
                return Err(ExecutionError::Cancelled {
                    operation: operation.to_string(),
                    attempts,
                    last_error,
                });
            }
            if ctx.deadline_passed() {
                warn!(operation, attempts, "Request deadline reached - stopping retries");
                return Err(ExecutionError::DeadlineExceeded {
                    operation: operation.to_string(),
                    attempts,
                    last_error,
                });
            }

            attempts += 1;
            let error = match op().await {
                Ok(()) => {
                    if attempts > 1 {
                        info!(operation, attempts, "Downstream call succeeded after retry");
                    }
                    return Ok(ExecutionOutcome::Applied { attempts });
                }
                Err(error) => error,
            };

            match self.classifier.classify(error.message()) {
                ErrorClass::AlreadyProcessed => {
                    info!(
                        operation,
                        attempts,
                        error = %error,
                        "Downstream reports event already processed - idempotent no-op"
                    );
                    return Ok(ExecutionOutcome::AlreadyProcessed { attempts });
                }
                ErrorClass::Terminal => {
                    warn!(operation, attempts, error = %error, "Terminal downstream failure");
                    return Err(ExecutionError::Terminal {
                        operation: operation.to_string(),
                        attempts,
                        source: error,
                    });
                }
                ErrorClass::Retryable => {}
            }

            if !self.policy.should_retry(attempts) {
                warn!(
                    operation,
                    attempts,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(ExecutionError::Exhausted {
                    operation: operation.to_string(),
                    attempts,
                    source: error,
                });
            }

            let delay = self.policy.calculate_delay(attempts - 1);
            if ctx.would_cross_deadline(delay) {
                warn!(
                    operation,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Next retry would run past the request deadline"
                );
                return Err(ExecutionError::DeadlineExceeded {
                    operation: operation.to_string(),
                    attempts,
                    last_error: Some(error),
                });
            }

            debug!(
                operation,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable downstream failure - backing off"
            );

            tokio::select! {
                biased;
                () = ctx.cancellation().cancelled() => {
                    warn!(operation, attempts, "Request cancelled during backoff");
                    return Err(ExecutionError::Cancelled {
                        operation: operation.to_string(),
                        attempts,
                        last_error: Some(error),
                    });
                }
                () = tokio::time::sleep(delay) => {}
            }

            last_error = Some(error);
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
