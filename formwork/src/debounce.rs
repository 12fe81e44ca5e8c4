//! Timer-based coalescing of repeated requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::trace;
use tokio::task::JoinHandle;

use crate::sync::lock;

#[derive(Debug, Default)]
struct Slot {
    /// Bumped by every schedule/cancel; a timer only fires if it still
    /// holds the current generation.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

/// Runs at most one callback per quiet period, always the latest one.
///
/// Every [`schedule`](Self::schedule) call cancels the callback scheduled
/// before it. A zero delay runs the callback inline. Callbacks may schedule
/// again on the same debouncer. After [`dispose`](Self::dispose) nothing
/// fires any more.
///
/// Timers run on the ambient tokio runtime, so non-zero delays must be
/// scheduled from within one.
#[derive(Debug, Default)]
pub struct Debouncer {
    slot: Arc<Mutex<Slot>>,
}

impl Debouncer {
    /// Create an idle debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` after `delay` unless another call supersedes it.
    pub fn schedule<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut slot = lock(&self.slot);
            if slot.disposed {
                trace!("Debouncer disposed, dropping request");
                return;
            }
            slot.generation += 1;
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }

            if !delay.is_zero() {
                let generation = slot.generation;
                let shared = Arc::downgrade(&self.slot);
                slot.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let Some(shared) = shared.upgrade() else {
                        return;
                    };
                    {
                        let mut slot = lock(&shared);
                        if slot.disposed || slot.generation != generation {
                            return;
                        }
                        slot.timer = None;
                    }
                    callback();
                }));
                return;
            }
        }
        callback();
    }

    /// Drop the pending callback, if any.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }

    /// Cancel and refuse every later request.
    pub fn dispose(&self) {
        self.cancel();
        lock(&self.slot).disposed = true;
    }

    /// Check if a callback is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).timer.is_some()
    }

    /// Check if the debouncer was disposed.
    pub fn is_disposed(&self) -> bool {
        lock(&self.slot).disposed
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = {
            let count = Arc::clone(&count);
            move || count.load(Ordering::SeqCst)
        };
        (count, read)
    }

    #[test]
    fn test_zero_delay_runs_inline() {
        let debouncer = Debouncer::new();
        let (count, read) = counter();
        debouncer.schedule(Duration::ZERO, move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(read(), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_request_wins() {
        let debouncer = Debouncer::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        for (at, label) in [(0, "first"), (30, "second"), (30, "third")] {
            tokio::time::sleep(Duration::from_millis(at)).await;
            let fired = Arc::clone(&fired);
            debouncer.schedule(Duration::from_millis(100), move || {
                fired.lock().unwrap().push(label);
            });
        }

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["third"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let debouncer = Debouncer::new();
        let (count, read) = counter();
        debouncer.schedule(Duration::from_millis(50), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(read(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_prevents_firing() {
        let debouncer = Debouncer::new();
        let (count, read) = counter();
        let again = Arc::clone(&count);
        debouncer.schedule(Duration::from_millis(50), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.dispose();
        debouncer.schedule(Duration::ZERO, move || {
            again.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(read(), 0);
        assert!(debouncer.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentrant_schedule() {
        let debouncer = Arc::new(Debouncer::new());
        let (count, read) = counter();

        let inner = Arc::clone(&debouncer);
        debouncer.schedule(Duration::from_millis(10), move || {
            count.fetch_add(1, Ordering::SeqCst);
            let count = Arc::clone(&count);
            inner.schedule(Duration::from_millis(10), move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        });

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(read(), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(read(), 2);
    }
}
