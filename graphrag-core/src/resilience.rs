// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Retry policy for collaborator clients.
//!
//! Only provider clients retry (rate limits, 5xx). The retrievers and the
//! answer generator never retry a collaborator call themselves.

use crate::context::{CallContext, CancelReason};
use crate::error::RagError;
use rand::random;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::exponential()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let jitter_factor = 1.0 + (random::<f64>() - 0.5) * 2.0 * self.jitter;
        let jittered = base * jitter_factor;
        let clamped = jittered.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(clamped)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Backoff sleeps honor `ctx`; a cancelled context ends the loop.
    pub async fn run<F, Fut, T, E>(
        &self,
        ctx: &CallContext,
        is_transient: impl Fn(&E) -> bool,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let err = match ctx.guard(operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(cancelled) => return Err(RetryError::from_rag(cancelled)),
            };

            attempt += 1;
            if attempt >= attempts || !is_transient(&err) {
                return Err(RetryError::Inner(err));
            }

            let delay = self.delay_for_attempt(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient provider error, backing off"
            );
            if let Err(cancelled) = ctx.sleep(delay).await {
                return Err(RetryError::from_rag(cancelled));
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("Request cancelled: {0}")]
    Cancelled(CancelReason),
    #[error("{0}")]
    Inner(E),
}

impl<E> RetryError<E> {
    fn from_rag(err: RagError) -> Self {
        match err {
            RagError::Cancelled(reason) => RetryError::Cancelled(reason),
            // guard only fails with Cancelled
            _ => RetryError::Cancelled(CancelReason::Signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_delay_grows_and_clamps() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::exponential()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<String>> = fast_policy(3)
            .run(&CallContext::new(), |_| true, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("503 on call {}", n))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<String>> = fast_policy(5)
            .run(&CallContext::new(), |_| false, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("401 unauthorized".to_string())
            })
            .await;
        assert!(matches!(result, Err(RetryError::Inner(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_never_calls() {
        let ctx = CallContext::new();
        ctx.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<String>> = fast_policy(3)
            .run(&ctx, |_| true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RetryError::Cancelled(CancelReason::Signal))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
