//! Caller-supplied cancellation and deadline for scaler operations

use crate::error::ScalerError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Per-call context threaded through every cluster query
///
/// Cloning shares the cancellation token. The default context never
/// cancels and has no deadline.
#[derive(Debug, Clone, Default)]
pub struct ScalerContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ScalerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::default().deadline_at(Instant::now() + timeout)
    }

    /// Context driven by an existing cancellation token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it completes, the token fires or the deadline passes
    ///
    /// An interrupted future is dropped.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ScalerError>
    where
        F: Future<Output = Result<T, ScalerError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ScalerError::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScalerError::Cancelled),
            _ = deadline => Err(ScalerError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = ScalerContext::new();
        let value = ctx.run(async { Ok::<_, ScalerError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_returns_cancelled_when_token_fired() {
        let ctx = ScalerContext::new();
        ctx.cancel();

        let result = ctx.run(async { Ok::<_, ScalerError>(1) }).await;
        assert!(matches!(result, Err(ScalerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_future() {
        let token = CancellationToken::new();
        let ctx = ScalerContext::with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = ctx
            .run(async {
                std::future::pending::<()>().await;
                Ok::<_, ScalerError>(())
            })
            .await;

        canceller.await.unwrap();
        assert!(matches!(result, Err(ScalerError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = ScalerContext::with_timeout(Duration::from_secs(5));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, ScalerError>(())
            })
            .await;

        assert!(matches!(result, Err(ScalerError::DeadlineExceeded)));
    }

    #[test]
    fn test_default_context_has_no_deadline() {
        let ctx = ScalerContext::default();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_cancelled());
    }
}
