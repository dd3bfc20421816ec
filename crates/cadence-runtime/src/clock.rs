//! The cadence clock.
//!
//! A fixed-cadence tick driver: it owns nothing but its period and the
//! callback it fires. Ticks can take arbitrarily long (a tick may block on
//! the solver), so the loop runs on the blocking pool and re-anchors on the
//! next deadline rather than sleeping a fixed amount, keeping the cadence
//! drift-free.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodically fires a callback until stopped.
pub struct TickDriver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickDriver {
    /// Start ticking. The callback runs on the blocking pool; a tick that
    /// overruns the period delays the next one rather than skipping it.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tracing::debug!(period_ms = period.as_millis() as u64, "tick driver started");
        let handle = tokio::task::spawn_blocking(move || {
            let mut deadline = Instant::now() + period;
            while !token.is_cancelled() {
                on_tick();
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
                deadline += period;
            }
        });
        Self { cancel, handle }
    }

    /// Stop ticking and wait for the loop to wind down. Takes effect at the
    /// next tick boundary.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
        tracing::debug!("tick driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_driver_fires_repeatedly_until_stopped() {
        tokio_test::block_on(async {
            let count = Arc::new(AtomicUsize::new(0));
            let seen = Arc::clone(&count);
            let driver = TickDriver::start(Duration::from_millis(5), move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });

            tokio::time::sleep(Duration::from_millis(40)).await;
            driver.stop().await;

            let fired = count.load(Ordering::SeqCst);
            assert!(fired >= 2, "expected repeated ticks, got {fired}");

            let after_stop = count.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(count.load(Ordering::SeqCst), after_stop);
        });
    }
}
