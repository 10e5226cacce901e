use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide shutdown flag.
///
/// Clones share the same flag. Once raised it stays raised; waiting calls
/// notice it after their current attempt and stop retrying.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown requested");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
