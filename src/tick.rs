use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A periodic tick source whose rate the state machine can change.
pub trait TickTimer {
    fn set_frequency(&mut self, hz: u32);
}

/// Creates the producer and consumer ends of a tick flag.
///
/// Ticks raised before the consumer looks are merged into one; a tick
/// raised while the consumer is busy is kept for its next look.
pub fn tick_channel() -> (TickNotifier, TickFlag) {
    let flag = Arc::new(AtomicBool::new(false));
    (
        TickNotifier {
            flag: Arc::clone(&flag),
        },
        TickFlag { flag },
    )
}

/// Producer end, owned by whatever generates ticks.
#[derive(Debug)]
pub struct TickNotifier {
    flag: Arc<AtomicBool>,
}

impl TickNotifier {
    pub fn notify(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Consumer end, polled by the control loop.
#[derive(Debug)]
pub struct TickFlag {
    flag: Arc<AtomicBool>,
}

impl TickFlag {
    /// Reads and clears the flag in one step.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Tick timer backed by a background thread.
pub struct ThreadTicker {
    period_us: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTicker {
    pub fn spawn(notifier: TickNotifier, hz: u32) -> Self {
        let period_us = Arc::new(AtomicU64::new(Self::period_for(hz)));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let period_us = Arc::clone(&period_us);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut deadline = Instant::now();
                while running.load(Ordering::Relaxed) {
                    deadline += Duration::from_micros(period_us.load(Ordering::Relaxed));
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        // Fell behind, skip the missed periods.
                        deadline = now;
                    }
                    notifier.notify();
                }
            })
        };

        Self {
            period_us,
            running,
            handle: Some(handle),
        }
    }

    fn period_for(hz: u32) -> u64 {
        1_000_000 / u64::from(hz.max(1))
    }
}

impl TickTimer for ThreadTicker {
    fn set_frequency(&mut self, hz: u32) {
        log::debug!("Tick rate set to {} Hz", hz);
        self.period_us.store(Self::period_for(hz), Ordering::Relaxed);
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
