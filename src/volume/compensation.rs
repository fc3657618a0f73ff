//! Compensation scope
//!
//! Tracks the undo actions for side effects performed during one logical
//! operation. Actions run in reverse registration order, and only when the
//! operation fails after the side effect; a committed scope discards them
//! all. A scope never outlives the call that created it.

use futures::future::BoxFuture;
use std::future::Future;
use tracing::warn;

type CompensationFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Ordered set of compensating actions for one in-flight operation
#[derive(Default)]
pub struct CompensationScope {
    actions: Vec<(String, CompensationFn)>,
}

impl CompensationScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an undo action for a side effect that just succeeded.
    ///
    /// The label identifies the action in logs when it runs or is leaked.
    pub fn register<F, Fut>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.actions
            .push((label.into(), Box::new(move || Box::pin(action()))));
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if no actions are pending
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The operation completed; discard all actions without running them
    pub fn commit(mut self) {
        self.actions.clear();
    }

    /// The operation failed; run every action in reverse registration order.
    ///
    /// Compensation is best effort: each action is responsible for logging
    /// its own failure, and unwinding continues regardless.
    pub async fn unwind(mut self) {
        while let Some((label, action)) = self.actions.pop() {
            warn!("Running compensating action: {}", label);
            action().await;
        }
    }
}

impl Drop for CompensationScope {
    fn drop(&mut self) {
        // Async work cannot run here; a leak means the surrounding code
        // exited without commit() or unwind().
        if !self.actions.is_empty() {
            let labels: Vec<&str> = self.actions.iter().map(|(l, _)| l.as_str()).collect();
            warn!(
                "Compensation scope dropped with {} pending action(s): {:?}",
                self.actions.len(),
                labels
            );
        }
    }
}
