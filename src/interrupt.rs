use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Returned by work that stopped because the flag was raised.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Interrupted")]
pub struct Interrupted;

/// Shared flag raised by the Ctrl-C handler and polled by long-running work.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_triggered() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Completes once the flag is raised. Meant to race a request in
    /// `tokio::select!`.
    pub async fn raised(&self) {
        while !self.is_triggered() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_state() {
        let flag = InterruptFlag::new();
        let handler_copy = flag.clone();
        assert!(!flag.is_triggered());
        assert_eq!(flag.check(), Ok(()));

        handler_copy.trigger();
        assert!(flag.is_triggered());
        assert_eq!(flag.check(), Err(Interrupted));
    }

    #[test]
    fn test_raised_wakes_a_pending_select() {
        let flag = InterruptFlag::new();
        let handler_copy = flag.clone();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handler_copy.trigger();
        });
        let interrupted = runtime.block_on(async {
            tokio::select! {
                _ = std::future::pending::<()>() => false,
                _ = flag.raised() => true,
            }
        });
        trigger.join().unwrap();

        assert!(interrupted);
    }
}
