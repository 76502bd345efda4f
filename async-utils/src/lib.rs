//! Async utilities for deadline- and cancellation-aware futures.
//!
//! Provides the `OrTimeoutExt` trait for racing a future against a
//! deadline, and the `OrCancelExt` trait for racing a future against
//! tokio's `CancellationToken`. Both leave the losing side to be dropped;
//! a storage call that loses the race may still complete inside the
//! backend, but its result is discarded.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error returned when a future's deadline elapses first.
#[derive(Debug, PartialEq, Eq)]
pub struct Elapsed {
    /// The deadline that was exceeded.
    pub after: Duration,
}

/// Error returned when a future is cancelled.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Extension trait for bounding futures with a deadline.
///
/// Returns `Ok(output)` if the future completes within `deadline`, or
/// `Err(Elapsed)` if the timer fires first.
#[async_trait]
pub trait OrTimeoutExt: Sized {
    type Output;

    async fn or_timeout(self, deadline: Duration) -> Result<Self::Output, Elapsed>;
}

#[async_trait]
impl<F> OrTimeoutExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_timeout(self, deadline: Duration) -> Result<Self::Output, Elapsed> {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => Err(Elapsed { after: deadline }),
            res = self => Ok(res),
        }
    }
}

/// Extension trait for making futures cancellable.
///
/// Returns `Err(CancelErr::Cancelled)` if the token fires before the
/// future completes; a token cancelled up front rejects on first poll.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}
