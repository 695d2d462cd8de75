use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TICK: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_STEP: f64 = 15.0;
pub const DEFAULT_CEILING: f64 = 90.0;
pub const COMPLETE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressPhase {
    Idle,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    pub percent: f64,
}

impl ProgressSnapshot {
    fn idle() -> Self {
        Self {
            phase: ProgressPhase::Idle,
            percent: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub tick: Duration,
    /// Upper bound of the random increment applied on each tick.
    pub max_step: f64,
    /// Highest value a tick may reach; only `success` goes past it.
    pub ceiling: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            max_step: DEFAULT_MAX_STEP,
            ceiling: DEFAULT_CEILING,
        }
    }
}

impl ProgressConfig {
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    fn sanitized(self) -> Self {
        Self {
            tick: self.tick.max(Duration::from_millis(1)),
            max_step: self.max_step.max(0.0),
            ceiling: self.ceiling.clamp(0.0, COMPLETE),
        }
    }
}

struct Ticker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Synthetic progress for an operation whose real progress is unknown.
///
/// While running, a background tick raises the percentage by a random step
/// up to the configured ceiling. The owner reports the outcome with
/// [`success`](Self::success) or [`fail`](Self::fail); both cancel the tick
/// before writing the terminal value. Must be started inside a Tokio runtime.
pub struct ProgressEstimator {
    config: ProgressConfig,
    state: Arc<watch::Sender<ProgressSnapshot>>,
    rng: StdRng,
    ticker: Option<Ticker>,
}

impl ProgressEstimator {
    pub fn new(config: ProgressConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_rng(config: ProgressConfig, rng: StdRng) -> Self {
        let (state, _) = watch::channel(ProgressSnapshot::idle());
        Self {
            config: config.sanitized(),
            state: Arc::new(state),
            rng,
            ticker: None,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.state.subscribe()
    }

    /// Resets to 0 and begins ticking. Restarting cancels any previous tick.
    pub fn start(&mut self) -> watch::Receiver<ProgressSnapshot> {
        self.cancel_ticker();
        self.state.send_modify(|snapshot| {
            snapshot.phase = ProgressPhase::Running;
            snapshot.percent = 0.0;
        });
        self.spawn_ticker();
        tracing::debug!(tick_ms = self.config.tick.as_millis() as u64, "progress started");
        self.subscribe()
    }

    pub fn success(&mut self) {
        self.cancel_ticker();
        self.state.send_modify(|snapshot| {
            snapshot.phase = ProgressPhase::Done;
            snapshot.percent = COMPLETE;
        });
        tracing::debug!("progress complete");
    }

    pub fn fail(&mut self) {
        self.cancel_ticker();
        self.state.send_modify(|snapshot| {
            snapshot.phase = ProgressPhase::Failed;
            snapshot.percent = 0.0;
        });
        tracing::debug!("progress reset after failure");
    }

    /// Halts the tick. Safe to call repeatedly or before `start`. A running
    /// estimator goes back to idle and keeps its last value.
    pub fn stop(&mut self) {
        self.cancel_ticker();
        self.state.send_if_modified(|snapshot| {
            if snapshot.phase != ProgressPhase::Running {
                return false;
            }
            snapshot.phase = ProgressPhase::Idle;
            true
        });
    }

    /// Runs `operation` under the estimator and hands its result back as is.
    pub async fn track<F, T, E>(&mut self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.start();
        let guard = StopOnDrop(self);
        let result = operation.await;
        match &result {
            Ok(_) => guard.0.success(),
            Err(_) => guard.0.fail(),
        }
        result
    }

    fn spawn_ticker(&mut self) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let state = Arc::clone(&self.state);
        let config = self.config.clone();
        let mut rng = StdRng::from_rng(&mut self.rng);

        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + config.tick, config.tick);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticks.tick() => {
                        let step = rng.random_range(0.0..=config.max_step);
                        state.send_if_modified(|snapshot| {
                            if snapshot.phase != ProgressPhase::Running {
                                return false;
                            }
                            let next = (snapshot.percent + step).min(config.ceiling);
                            if next <= snapshot.percent {
                                return false;
                            }
                            snapshot.percent = next;
                            tracing::trace!(percent = next, "progress tick");
                            true
                        });
                    }
                }
            }
        });

        self.ticker = Some(Ticker { token, handle });
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.token.cancel();
            ticker.handle.abort();
        }
    }
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

impl Drop for ProgressEstimator {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

struct StopOnDrop<'a>(&'a mut ProgressEstimator);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}
