/// Shared progress accounting for launch stages.
///
/// One tracker is shared across all concurrent sub-tasks of a stage; every
/// mutation goes through atomics so tasks never contend on a lock, and
/// observers read a consistent snapshot through a watch channel.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Point-in-time snapshot published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl ProgressState {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.current as f64 / self.total as f64).min(1.0)
        }
    }
}

type CompletionCallback = Box<dyn FnOnce() + Send>;

pub struct ProgressTracker {
    current: AtomicUsize,
    total: AtomicUsize,
    cancelled: AtomicBool,
    callback_fired: AtomicBool,
    on_complete: Mutex<Option<CompletionCallback>>,
    state_tx: watch::Sender<ProgressState>,
    state_rx: watch::Receiver<ProgressState>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        let (state_tx, state_rx) = watch::channel(ProgressState {
            current: 0,
            total,
            cancelled: false,
        });
        Self {
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(total),
            cancelled: AtomicBool::new(false),
            callback_fired: AtomicBool::new(false),
            on_complete: Mutex::new(None),
            state_tx,
            state_rx,
        }
    }

    /// A tracker that is already finished. Used for stages with no work
    /// (e.g. zero libraries to download) so downstream gating still fires.
    pub fn completed() -> Self {
        let tracker = Self::new(0);
        tracker.publish();
        tracker
    }

    /// Reset the counters for a new unit count. Cancellation is sticky: a
    /// cancel delivered before the stage begins must not be lost, so only an
    /// explicit [`ProgressTracker::reset`] clears it.
    pub fn begin(&self, total: usize) {
        self.current.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.callback_fired.store(false, Ordering::SeqCst);
        self.publish();
    }

    /// Clear all state, including cancellation, for a fresh launch attempt
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.begin(0);
    }

    /// Register the completion callback. At most one is held; it fires
    /// exactly once, from whichever task performs the completing increment.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        let mut slot = self.on_complete.lock().unwrap();
        *slot = Some(Box::new(callback));
        drop(slot);

        // Work may already have finished before the callback was registered
        if self.is_done() {
            self.try_fire_callback();
        }
    }

    /// Record `n` finished units. Safe to call from any thread or task.
    pub fn inc(&self, n: usize) {
        let previous = self.current.fetch_add(n, Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        self.publish();

        if previous < total && previous + n >= total {
            self.try_fire_callback();
        }
    }

    fn try_fire_callback(&self) {
        if self.callback_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let callback = self.on_complete.lock().unwrap().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn publish(&self) {
        let _ = self.state_tx.send(self.snapshot());
    }

    pub fn snapshot(&self) -> ProgressState {
        ProgressState {
            current: self.current.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }

    /// Observe state changes; the receiver sees every published snapshot
    /// that is current when it polls
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state_rx.clone()
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Completed fraction in [0, 1]; an empty tracker reads as done
    pub fn fraction(&self) -> f64 {
        self.snapshot().fraction()
    }

    pub fn int_percent(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }

    pub fn percent_string(&self) -> String {
        format!("{}%", self.int_percent())
    }

    pub fn is_done(&self) -> bool {
        self.current.load(Ordering::SeqCst) >= self.total.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation. In-flight work finishes its current
    /// chunk; nothing new starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.publish();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("ProgressTracker")
            .field("current", &state.current)
            .field("total", &state.total)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}
