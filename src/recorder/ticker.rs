//! Tick scheduling port
//!
//! The display refresh tick is abstracted behind [`TickScheduler`] so tests
//! can fire ticks synchronously instead of waiting on a real timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Default tick period for display refresh
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Callback invoked on every tick
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Something that can call a callback periodically
pub trait TickScheduler {
    /// Call `on_tick` every `interval` until the returned handle is cancelled
    /// or dropped.
    fn schedule(&mut self, interval: Duration, on_tick: TickCallback) -> TickHandle;
}

/// Cancels a scheduled tick. Cancelling twice is harmless; dropping the
/// handle cancels as well.
#[derive(Debug)]
pub struct TickHandle {
    cancelled: Arc<AtomicBool>,
}

impl TickHandle {
    fn new() -> (Self, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: Arc::clone(&cancelled),
            },
            cancelled,
        )
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Ticks from a background thread that sleeps between calls
#[derive(Debug, Default)]
pub struct ThreadTicker;

impl TickScheduler for ThreadTicker {
    fn schedule(&mut self, interval: Duration, mut on_tick: TickCallback) -> TickHandle {
        let (handle, cancelled) = TickHandle::new();
        thread::spawn(move || loop {
            thread::sleep(interval);
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            on_tick();
        });
        handle
    }
}

struct ManualEntry {
    interval: Duration,
    cancelled: Arc<AtomicBool>,
    on_tick: TickCallback,
}

/// Ticks only when told to. Clones share the same registrations.
#[derive(Clone, Default)]
pub struct ManualTicker {
    entries: Arc<Mutex<Vec<ManualEntry>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every live callback once; returns how many fired
    pub fn fire(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
        for entry in entries.iter_mut() {
            (entry.on_tick)();
        }
        entries.len()
    }

    /// Number of live (uncancelled) registrations
    pub fn active(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Interval of the most recent live registration
    pub fn interval(&self) -> Option<Duration> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .rev()
            .find(|e| !e.cancelled.load(Ordering::SeqCst))
            .map(|e| e.interval)
    }
}

impl TickScheduler for ManualTicker {
    fn schedule(&mut self, interval: Duration, on_tick: TickCallback) -> TickHandle {
        let (handle, cancelled) = TickHandle::new();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(ManualEntry {
            interval,
            cancelled,
            on_tick,
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    #[test]
    fn test_manual_ticker_fires_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut ticker = ManualTicker::new();

        let counter = Arc::clone(&count);
        let handle = ticker.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(ticker.interval(), Some(Duration::from_millis(10)));
        assert_eq!(ticker.fire(), 1);
        assert_eq!(ticker.fire(), 1);
        handle.cancel();
        handle.cancel();
        assert_eq!(ticker.fire(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(ticker.active(), 0);
    }

    #[test]
    fn test_dropping_handle_cancels() {
        let mut ticker = ManualTicker::new();
        {
            let _handle = ticker.schedule(Duration::from_millis(10), Box::new(|| {}));
            assert_eq!(ticker.active(), 1);
        }
        assert_eq!(ticker.active(), 0);
    }

    #[test]
    fn test_thread_ticker_delivers_ticks() {
        let (tx, rx) = mpsc::channel();
        let mut ticker = ThreadTicker;
        let handle = ticker.schedule(
            Duration::from_millis(1),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.cancel();
        assert!(handle.is_cancelled());
    }
}
