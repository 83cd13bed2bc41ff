use std::sync::Arc;

use parking_lot::Mutex;
use repl_time::{Time, TimeProvider};
use tokio_util::sync::CancellationToken;

/// A completion callback slot that fires exactly once.
///
/// Every `Request` and `Job` in this workspace finishes by calling
/// [`CompletionSlot::complete`] instead of invoking a stored callback
/// directly, so that "the callback fires exactly once" is a property of
/// the primitive rather than something each state machine has to get
/// right on its own.
pub struct CompletionSlot<T> {
    callback: Mutex<Option<Box<dyn FnOnce(T) + Send>>>,
}

impl<T> std::fmt::Debug for CompletionSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSlot")
            .field("fired", &self.callback.lock().is_none())
            .finish()
    }
}

impl<T> CompletionSlot<T> {
    pub fn new(callback: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    /// Invokes the callback with `value` unless it has already fired.
    /// Returns `true` if this call is the one that fired it.
    pub fn complete(&self, value: T) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(cb) => {
                cb(value);
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.callback.lock().is_none()
    }
}

/// Owns the deadline and cancellation token for one suspended operation
/// (a Request awaiting a response, a Job awaiting its children, an ingest
/// pipeline awaiting the next safe point).
///
/// `Task` is the single abstraction `repl_request`, `repl_qservmgt`, and
/// `repl_job` build their suspension points on; ordering and backpressure
/// remain the responsibility of `repl_messenger`'s per-worker channel.
#[derive(Debug, Clone)]
pub struct Task {
    cancel: CancellationToken,
    deadline: Option<Time>,
}

impl Task {
    pub fn new(deadline: Option<Time>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Option<Time> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Races `fut` against cancellation and (if a deadline was set) against
    /// expiration, returning which of the three happened first.
    pub async fn race<F, O>(&self, time_provider: &Arc<dyn TimeProvider>, fut: F) -> TaskOutcome<O>
    where
        F: std::future::Future<Output = O>,
    {
        tokio::pin!(fut);
        let cancelled = self.cancel.cancelled();
        tokio::pin!(cancelled);

        match self.deadline {
            None => tokio::select! {
                biased;
                _ = &mut cancelled => TaskOutcome::Cancelled,
                out = &mut fut => TaskOutcome::Completed(out),
            },
            Some(deadline) => {
                let sleep = time_provider.sleep_until(deadline);
                tokio::pin!(sleep);
                tokio::select! {
                    biased;
                    _ = &mut cancelled => TaskOutcome::Cancelled,
                    _ = &mut sleep => TaskOutcome::Expired,
                    out = &mut fut => TaskOutcome::Completed(out),
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
    Expired,
}
