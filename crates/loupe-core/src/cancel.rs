use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Advisory cancellation flag shared between a unit of work and its owner.
///
/// Cancellation is cooperative: long-running work checks [`is_cancelled`]
/// between natural checkpoints and stops early; the caller discards whatever
/// partial result was produced.
///
/// [`is_cancelled`]: CancellationToken::is_cancelled
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
