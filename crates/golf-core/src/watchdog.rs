//! Deadline watchdog for running sandboxes.
//!
//! The watchdog races a timer against the sandbox's natural exit. The race
//! is settled through an [`OutcomeSlot`], a single-assignment cell: the
//! timer only kills the sandbox if it claims the slot first, and the
//! controller only reports a natural exit if *it* claims the slot first.
//! The loser's action is a no-op, so there is never a kill after a
//! successful cancellation and never a timeout flag without a kill.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Which event settled the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The sandbox exited on its own.
    Completed,
    /// The deadline passed first and the sandbox was killed.
    Expired,
}

/// Single-assignment slot shared by the timer and the controller.
#[derive(Debug, Clone, Default)]
pub struct OutcomeSlot(Arc<OnceLock<Resolution>>);

impl OutcomeSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to settle the race. Returns `true` only for the first caller.
    pub fn resolve(&self, resolution: Resolution) -> bool {
        self.0.set(resolution).is_ok()
    }

    /// The settled outcome, if any.
    pub fn get(&self) -> Option<Resolution> {
        self.0.get().copied()
    }
}

/// A timer armed against one sandbox.
///
/// Dropping an armed watchdog cancels its timer.
#[derive(Debug)]
pub struct Watchdog {
    slot: OutcomeSlot,
    deadline: Duration,
    timer: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Arm a timer that runs `on_expire` once `deadline` has elapsed,
    /// unless [`complete`](Self::complete) settles the race first.
    pub fn arm<F, Fut>(deadline: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let slot = OutcomeSlot::new();
        let timer_slot = slot.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if timer_slot.resolve(Resolution::Expired) {
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Deadline exceeded, terminating sandbox"
                );
                on_expire().await;
            }
        });

        tracing::trace!(deadline_ms = deadline.as_millis() as u64, "Watchdog armed");
        Self {
            slot,
            deadline,
            timer: Some(timer),
        }
    }

    /// The budget this watchdog enforces.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Whether the timer has claimed the outcome.
    pub fn has_fired(&self) -> bool {
        self.slot.get() == Some(Resolution::Expired)
    }

    /// Report that the sandbox is no longer running and settle the race.
    ///
    /// If the timer already fired, this waits for its kill to finish before
    /// returning [`Resolution::Expired`], so both activities are joined.
    pub async fn complete(mut self) -> Resolution {
        let timer = self.timer.take();

        if self.slot.resolve(Resolution::Completed) {
            if let Some(timer) = timer {
                timer.abort();
            }
            tracing::trace!("Watchdog cancelled");
            return Resolution::Completed;
        }

        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Watchdog kill task panicked");
                }
            }
        }
        Resolution::Expired
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_watchdog(deadline: Duration) -> (Watchdog, Arc<AtomicUsize>) {
        let kills = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&kills);
        let watchdog = Watchdog::arm(deadline, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (watchdog, kills)
    }

    #[test]
    fn test_slot_single_assignment() {
        let slot = OutcomeSlot::new();
        assert_eq!(slot.get(), None);
        assert!(slot.resolve(Resolution::Completed));
        assert!(!slot.resolve(Resolution::Expired));
        assert_eq!(slot.get(), Some(Resolution::Completed));
    }

    #[test]
    fn test_slot_clones_share_state() {
        let slot = OutcomeSlot::new();
        let other = slot.clone();
        assert!(other.resolve(Resolution::Expired));
        assert!(!slot.resolve(Resolution::Completed));
        assert_eq!(slot.get(), Some(Resolution::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_before_deadline_cancels() {
        let (watchdog, kills) = counting_watchdog(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!watchdog.has_fired());
        assert_eq!(watchdog.complete().await, Resolution::Completed);

        // Well past the deadline, the cancelled timer must not kill.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(kills.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_once() {
        let (watchdog, kills) = counting_watchdog(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(watchdog.has_fired());
        assert_eq!(watchdog.complete().await, Resolution::Expired);
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_joins_pending_kill() {
        let kills = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&kills);
        let watchdog = Watchdog::arm(Duration::from_secs(1), move || async move {
            // A slow kill still finishes before `complete` returns.
            tokio::time::sleep(Duration::from_secs(5)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(kills.load(Ordering::SeqCst), 0);
        assert_eq!(watchdog.complete().await, Resolution::Expired);
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disarms() {
        let (watchdog, kills) = counting_watchdog(Duration::from_secs(10));
        assert_eq!(watchdog.deadline(), Duration::from_secs(10));
        drop(watchdog);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(kills.load(Ordering::SeqCst), 0);
    }
}
