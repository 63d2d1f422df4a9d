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

//! Per-request cancellation and deadlines
//!
//! Every collaborator call (embed, store run, model completion) receives a
//! [`CallContext`]. Collaborators may use it to bound their own I/O, and the
//! core races each call against it via [`CallContext::guard`], so a collaborator
//! that ignores the context still cannot outlive it.

use crate::error::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a request stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller triggered the cancellation token
    Signal,
    /// The caller-supplied deadline passed
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Signal => write!(f, "cancelled by caller"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

/// Cancellation token plus optional deadline for one request
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// A context that never expires on its own
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// Set an absolute deadline
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use an externally owned cancellation token (e.g. a Ctrl-C handler's)
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel this request and every call sharing the token
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail fast if the request is already cancelled or expired
    pub fn check(&self) -> RagResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RagError::Cancelled(CancelReason::Signal));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(RagError::Cancelled(CancelReason::Deadline));
            }
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the request is cancelled or expires first
    pub async fn guard<F>(&self, fut: F) -> RagResult<F::Output>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RagError::Cancelled(CancelReason::Signal)),
            _ = sleep_until(self.deadline) => Err(RagError::Cancelled(CancelReason::Deadline)),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration`, waking early with an error on cancellation
    pub async fn sleep(&self, duration: Duration) -> RagResult<()> {
        self.guard(tokio::time::sleep(duration)).await
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_output_through() {
        let ctx = CallContext::new();
        let value = ctx.guard(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let ctx = CallContext::new();
        ctx.cancel();
        let result = ctx.guard(async { 1 }).await;
        assert!(matches!(
            result,
            Err(RagError::Cancelled(CancelReason::Signal))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_call() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let result = ctx
            .guard(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(
            result,
            Err(RagError::Cancelled(CancelReason::Deadline))
        ));
    }

    #[tokio::test]
    async fn test_cancel_from_another_task() {
        let ctx = CallContext::new();
        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let result = ctx.guard(std::future::pending::<()>()).await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
