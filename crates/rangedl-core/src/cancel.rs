//! Single-writer, many-reader cancellation token.
//!
//! Workers, the Retry Supervisor, and Probe all hold a clone and check
//! [`CancellationToken::is_set`] between every network buffer and before
//! every backoff sleep. Only the Job Controller ever calls `set`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
