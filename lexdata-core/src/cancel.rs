//! Request deadlines and cancellation.
//!
//! A [`RequestScope`] travels with a tenant context and bounds every statement
//! issued through it. A statement still running when the deadline passes or
//! the [`CancelHandle`] fires is abandoned by the executor, which then asks the
//! server to cancel it.

use std::future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{DataError, DataResult};

/// Fires a [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every statement observing the paired signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes a [`CancelHandle`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Create a connected handle and signal.
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested. Never resolves if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return future::pending().await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Deadline and cancellation for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    deadline: Option<(Instant, Duration)>,
    cancel: CancelSignal,
}

impl RequestScope {
    /// A scope with no deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up after `timeout` from now.
    ///
    /// A timeout too far out to be represented sets no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout).map(|at| (at, timeout));
        self
    }

    /// Give up when the signal fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = signal;
        self
    }

    /// Apply `timeout` only if no deadline is set yet.
    pub fn or_timeout(self, timeout: Option<Duration>) -> Self {
        match (self.deadline, timeout) {
            (None, Some(timeout)) => self.with_timeout(timeout),
            _ => self,
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.map(|(at, _)| at)
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// The cancellation signal.
    pub fn signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Fail if the request is already cancelled or past its deadline.
    pub fn check(&self) -> DataResult<()> {
        if self.cancel.is_cancelled() {
            return Err(DataError::cancelled());
        }
        if let Some((at, budget)) = self.deadline {
            if Instant::now() >= at {
                return Err(DataError::timeout(budget.as_millis() as u64));
            }
        }
        Ok(())
    }

    /// Resolve with the matching error once the request must be abandoned.
    pub async fn abandoned(&self) -> DataError {
        let expiry = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => future::pending().await,
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => DataError::cancelled(),
            _ = expiry => {
                let budget = self.deadline.map(|(_, b)| b).unwrap_or_default();
                DataError::timeout(budget.as_millis() as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[tokio::test]
    async fn test_cancel_signal() {
        let (handle, signal) = CancelSignal::pair();
        assert!(!signal.is_cancelled());
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        handle.cancel();
        waiter.await.unwrap();
        assert!(signal.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_scope_cancelled() {
        let (handle, signal) = CancelSignal::pair();
        let scope = RequestScope::new().with_cancel(signal);
        assert!(scope.check().is_ok());
        handle.cancel();
        assert_eq!(scope.check().unwrap_err().code, ErrorCode::Cancelled);
        assert_eq!(scope.abandoned().await.code, ErrorCode::Cancelled);
    }

    #[test]
    fn test_unrepresentable_timeout_sets_no_deadline() {
        let scope = RequestScope::new().with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(scope.deadline(), None);
        assert!(scope.check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_deadline() {
        let scope = RequestScope::new().with_timeout(Duration::from_millis(50));
        assert!(scope.check().is_ok());
        let err = scope.abandoned().await;
        assert_eq!(err.code, ErrorCode::QueryTimeout);
        assert!(err.message.contains("50ms"));
        assert!(scope.check().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_fires() {
        let (handle, signal) = CancelSignal::pair();
        drop(handle);
        let scope = RequestScope::new()
            .with_cancel(signal)
            .with_timeout(Duration::from_secs(1));
        assert_eq!(scope.abandoned().await.code, ErrorCode::QueryTimeout);
    }

    #[test]
    fn test_or_timeout_keeps_existing() {
        let scope = RequestScope::new().with_timeout(Duration::from_secs(5));
        let scope = scope.or_timeout(Some(Duration::from_secs(60)));
        assert!(scope.remaining().unwrap() <= Duration::from_secs(5));
        assert!(RequestScope::new().or_timeout(None).deadline().is_none());
    }
}
