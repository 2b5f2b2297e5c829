//! Broadcast cadence scheduler for Nearcast.
//!
//! Fires at a fixed interval (20 Hz by default) so the world actor can push
//! periodic position snapshots, with budget monitoring and overrun
//! handling. Structural changes (join, leave) broadcast immediately and do
//! not go through the scheduler.
//!
//! # Disabled mode
//!
//! With a zero interval, [`TickScheduler::wait_for_tick`] pends forever and
//! only event-driven broadcasts happen.
//!
//! # Integration
//!
//! The scheduler sits inside the world actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* apply command */ }
//!         _ = scheduler.wait_for_tick() => {
//!             world.broadcast_snapshot();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the actor wakes up late for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Collapse missed ticks into this one and schedule the next from now.
    /// Snapshots are replace-style, so a missed one is never worth sending.
    #[default]
    Skip,
    /// Keep the original cadence. Missed deadlines fire back to back until
    /// the schedule catches up.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `Duration::ZERO` disables the scheduler.
    pub interval: Duration,
    pub policy: TickPolicy,
    /// Fraction of the interval (0.0–1.0) a tick's work may take before a
    /// warning is logged.
    pub budget_warn_threshold: f64,
    /// Fraction of the interval at which the warning becomes critical.
    pub budget_critical_threshold: f64,
    pub metrics_enabled: bool,
    /// Upper bound on random delay added to the first tick.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// Shortest supported interval (200 Hz).
    pub const MIN_INTERVAL: Duration = Duration::from_millis(5);

    /// A config ticking every `interval`, other fields default.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// A config that never ticks.
    pub fn disabled() -> Self {
        Self::every(Duration::ZERO)
    }

    /// Clamps out-of-range values, logging each fix.
    ///
    /// Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    /// The tick interval, or `None` when disabled.
    pub fn period(&self) -> Option<Duration> {
        (!self.interval.is_zero()).then_some(self.interval)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// The tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Deadlines collapsed into this tick under [`TickPolicy::Skip`].
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters and timings, updated as ticks fire and finish.
///
/// Work timings use the wall clock between `wait_for_tick` returning and
/// [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of work time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's work time over the interval. Above 1.0 is an overrun.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick source for one actor.
pub struct TickScheduler {
    config: TickConfig,
    period: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    tick_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Builds a scheduler; the first tick is due one interval (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();

        let next_tick = period.map(|p| TokioInstant::now() + p + first_tick_jitter(&config));

        match period {
            Some(p) => debug!(
                interval_ms = p.as_secs_f64() * 1000.0,
                policy = ?config.policy,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created disabled"),
        }

        Self {
            config,
            period,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Shorthand for `TickScheduler::new(TickConfig::every(interval))`.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Waits for the next tick.
    ///
    /// Pends forever while paused or disabled; other `select!` branches
    /// keep running. Cancel-safe: dropping the future before it resolves
    /// leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, period) = match (self.next_tick, self.period) {
            (Some(next), Some(period)) if !self.paused => (next, period),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "broadcast tick overrun, skipping ahead"
                        );
                    }
                }
                now + period
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "broadcast tick overrun, keeping cadence"
                    );
                }
                next + period
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the current tick's work.
    ///
    /// Feeds budget warnings and metrics. A call without a preceding tick
    /// is ignored.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(budget) = self.period {
            let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.metrics.budget_utilization = utilization;

            if utilization >= self.config.budget_critical_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    "broadcast exceeded tick budget"
                );
            } else if utilization >= self.config.budget_warn_threshold {
                debug!(
                    tick = self.tick_count,
                    utilization_pct = format!("{:.1}", utilization * 100.0),
                    "broadcast approaching tick budget"
                );
            }
        }

        if self.config.metrics_enabled {
            self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Restarts ticking one interval from now, so time spent paused never
    /// turns into a burst. Idempotent.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(p) = self.period {
                self.next_tick = Some(TokioInstant::now() + p);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disabled(&self) -> bool {
        self.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The tick interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.period
    }
}

fn first_tick_jitter(config: &TickConfig) -> Duration {
    let max = config.initial_jitter.as_micros() as u64;
    if max == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(rand::rng().random_range(0..max))
    }
}
