//! Cancellable repeating tasks and the session clock.

use log::debug;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Owner side of a session-wide cancellation flag.
#[derive(Debug)]
pub struct Cancellation {
    tx: watch::Sender<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning [`Cancellation`] fires or is dropped.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Fixed-period ticker that stops yielding once cancelled.
pub struct Ticker {
    interval: Interval,
    token: CancelToken,
}

impl Ticker {
    pub fn new(period: Duration, token: CancelToken) -> Self {
        let mut interval = time::interval(period);
        // A slow iteration delays the next one instead of bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, token }
    }

    /// Waits for the next tick. Returns `false` once cancelled.
    pub async fn tick(&mut self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let ticked = tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = self.interval.tick() => true,
        };
        ticked && !self.token.is_cancelled()
    }
}

/// Spawns `step` on a [`Ticker`]. The first iteration runs immediately.
pub fn spawn_repeating<F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancelToken,
    mut step: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        debug!("{} loop started ({:?} period)", name, period);
        let mut ticker = Ticker::new(period, token);
        while ticker.tick().await {
            step().await;
        }
        debug!("{} loop stopped", name);
    })
}

/// Monotonic millisecond clock anchored to wall time at session start.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    epoch_base_ms: u64,
    started: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        let epoch_base_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            epoch_base_ms,
            started: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.epoch_base_ms + self.started.elapsed().as_millis() as u64
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
