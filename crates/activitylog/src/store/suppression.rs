//! Scoped suppression of automatic activity logging.
//!
//! While at least one [`SuppressionGuard`] is alive, store instrumentation
//! drops the entries it would otherwise append. Guards nest, and each one
//! releases its hold when dropped, including during unwinding.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

/// Reentrant logging suppression counter.
///
/// Cloning shares the counter, so an entity store and an audit log store can
/// observe the same suppression state.
#[derive(Debug, Clone, Default)]
pub struct LogSuppression {
    depth: Arc<AtomicUsize>,
}

impl LogSuppression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress logging until the returned guard is dropped.
    #[must_use = "suppression ends as soon as the guard is dropped"]
    pub fn enter(&self) -> SuppressionGuard {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(depth, "activity logging suppressed");
        SuppressionGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    /// Whether automatic logging is currently suppressed.
    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Run `fut` with logging suppressed for its whole duration.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        let _guard = self.enter();
        fut.await
    }
}

/// Holds logging suppression; releases it on drop.
#[derive(Debug)]
pub struct SuppressionGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        let previous = self.depth.fetch_sub(1, Ordering::SeqCst);
        trace!(depth = previous.saturating_sub(1), "activity logging suppression released");
    }
}
