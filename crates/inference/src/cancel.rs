use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag telling a queued detection to stop before it reaches the model.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Cancels the flag when the returned guard is dropped.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let seen_by_worker = flag.clone();

        assert!(!seen_by_worker.is_cancelled());
        flag.cancel();
        assert!(seen_by_worker.is_cancelled());
    }

    #[test]
    fn test_guard_cancels_on_drop() {
        let flag = CancelFlag::new();
        {
            let _guard = flag.drop_guard();
            assert!(!flag.is_cancelled());
        }
        assert!(flag.is_cancelled());
    }
}
