//! The future value returned to callers, and the settle-once core
//!
//! Every request gets one [`Settler`] shared between its transport task and
//! its cancel handle. The settler's atomic flag is the structural guarantee
//! behind "exactly one terminal transition": whichever channel fires first
//! wins, and every later completion, error or cancel finds the flag already
//! set and does nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, Notify};

use crate::outcome::{Outcome, Payload};
use crate::transport::callback;
use crate::Result;

/// Single-shot outcome channel with an atomic settle-once guard
pub(crate) struct Settler {
    settled: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl Settler {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let settler = Arc::new(Self {
            settled: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
        });
        (settler, rx)
    }

    /// Deliver the terminal outcome. Succeeds exactly once per request;
    /// every later call is a no-op and reports false.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        if self.settled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let tx = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match tx {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }
}

/// Transport-specific cancel wiring carried by the [`FutureValue`]
pub(crate) enum Canceller {
    /// Signal the direct transport's abort channel
    Http(Arc<Notify>),
    /// Detach the callback transport's registered slot
    Callback {
        handled: Arc<AtomicBool>,
        name: String,
    },
}

/// The eventual result of one request, with an attached cancel operation.
///
/// Resolves with the payload of a successful or aborted exchange; rejects
/// with [`crate::Error`] for non-success statuses, network failures and
/// elapsed deadlines. A cancelled callback-transport request never settles
/// at all; the caller is expected to discard the value.
#[must_use = "a FutureValue does nothing until awaited or aborted"]
pub struct FutureValue {
    rx: oneshot::Receiver<Outcome>,
    canceller: Canceller,
}

impl FutureValue {
    pub(crate) fn new(rx: oneshot::Receiver<Outcome>, canceller: Canceller) -> Self {
        Self { rx, canceller }
    }

    /// Cancel the underlying exchange.
    ///
    /// Direct transport: the exchange is torn down and the future resolves
    /// with the aborted payload (status 0, no data). Callback transport: the
    /// registered callback is detached, any stored value discarded, and the
    /// future stays pending. Invoking cancel after the request settled is a
    /// no-op.
    pub fn abort(&self) {
        match &self.canceller {
            Canceller::Http(cancel) => cancel.notify_one(),
            Canceller::Callback { handled, name } => {
                if !handled.swap(true, Ordering::SeqCst) {
                    callback::registry().remove(name);
                }
            }
        }
    }
}

impl Future for FutureValue {
    type Output = Result<Payload>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.into_result()),
            // The sender was discarded without a terminal transition; only a
            // cancelled callback exchange does this, and that contract is
            // "neither resolve nor reject".
            Poll::Ready(Err(_)) => Poll::Pending,
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::STATUS_ABORTED;
    use std::time::Duration;

    #[test]
    fn test_settler_settles_exactly_once() {
        let (settler, mut rx) = Settler::new();
        assert!(settler.settle(Outcome::Aborted));
        assert!(!settler.settle(Outcome::TimedOut));
        assert!(settler.is_settled());
        assert_eq!(rx.try_recv().unwrap(), Outcome::Aborted);
    }

    #[tokio::test]
    async fn test_future_value_resolves_with_settled_outcome() {
        let (settler, rx) = Settler::new();
        let future = FutureValue::new(rx, Canceller::Http(Arc::new(Notify::new())));
        settler.settle(Outcome::Success(Payload {
            data: None,
            status_code: 204,
        }));
        let payload = future.await.unwrap();
        assert_eq!(payload.status_code, 204);
    }

    #[tokio::test]
    async fn test_future_value_rejects_with_failure() {
        let (settler, rx) = Settler::new();
        let future = FutureValue::new(rx, Canceller::Http(Arc::new(Notify::new())));
        settler.settle(Outcome::Failure(Payload {
            data: None,
            status_code: 500,
        }));
        assert_eq!(future.await.unwrap_err().status_code(), 500);
    }

    #[tokio::test]
    async fn test_aborted_outcome_resolves_not_rejects() {
        let (settler, rx) = Settler::new();
        let future = FutureValue::new(rx, Canceller::Http(Arc::new(Notify::new())));
        settler.settle(Outcome::Aborted);
        let payload = future.await.unwrap();
        assert_eq!(payload.status_code, STATUS_ABORTED);
        assert!(payload.data.is_none());
    }

    #[tokio::test]
    async fn test_dropped_sender_leaves_future_pending() {
        let (settler, rx) = Settler::new();
        let future = FutureValue::new(rx, Canceller::Http(Arc::new(Notify::new())));
        drop(settler);
        let waited = tokio::time::timeout(Duration::from_millis(50), future).await;
        assert!(waited.is_err(), "future must stay pending forever");
    }
}
