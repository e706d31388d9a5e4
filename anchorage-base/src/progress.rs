use std::sync::Arc;
use std::time::{Duration, Instant};

use derive_new::new;
use eyre::Result;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::instrument::Instrumented;
use tracing::{info, info_span, Instrument};

use crate::{ObserverMetrics, SyncTracker};

/// Calculates the expected time for the historical walk to catch up to the
/// chain tip, from a moving-average block rate net of tip progression.
pub struct CatchUpEtaCalculator {
    last_time: Instant,
    last_block: u64,
    last_target: u64,
    last_eta: Duration,
    /// Block processing rate less the tip progression rate, merged into a
    /// single moving average so partial updates do not overwrite each
    /// other.
    effective_rate: Option<f64>,
    /// How long a sample survives in the moving average, in seconds.
    time_window: f64,
}

impl CatchUpEtaCalculator {
    /// Start a fresh estimate at `start_block` aiming for `target_block`.
    pub fn new(start_block: u64, target_block: u64, time_window: f64) -> Self {
        Self {
            last_time: Instant::now(),
            last_block: start_block,
            last_target: target_block,
            last_eta: Duration::ZERO,
            effective_rate: None,
            time_window,
        }
    }

    /// Fold in the latest positions and return the updated estimate.
    pub fn calculate(&mut self, current_block: u64, current_target: u64) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_time).as_secs_f64();
        self.last_time = now;

        let blocks_processed = current_block.saturating_sub(self.last_block) as f64;
        let target_progression = current_target.saturating_sub(self.last_target) as f64;
        self.last_block = current_block;
        self.last_target = current_target;
        let new_rate = (blocks_processed - target_progression) / elapsed;

        // Only seed the moving average once movement is seen, otherwise a
        // quiet first sample takes a long time to normalize away.
        let effective_rate = if let Some(old_rate) = self.effective_rate {
            let new_coeff = (elapsed / self.time_window).min(0.9);
            let rate = new_rate * new_coeff + old_rate * (1.0 - new_coeff);
            self.effective_rate = Some(rate);
            rate
        } else {
            if new_rate != 0.0 {
                self.effective_rate = Some(new_rate);
            }
            new_rate
        };

        self.last_eta = if effective_rate <= 0.0 {
            // Losing ground against the tip; cap the estimate at a year.
            Duration::from_secs_f64(60.0 * 60.0 * 24.0 * 365.25)
        } else {
            Duration::from_secs_f64(
                current_target.saturating_sub(current_block) as f64 / effective_rate,
            )
        };
        self.last_eta
    }
}

/// Render a catch-up estimate for progress logs.
pub fn fmt_catch_up_time(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 60 * 60 * 24 * 365 {
        "over a year".to_owned()
    } else if secs >= 3_600 {
        format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Periodically logs sync progress and refreshes the progress gauges. Only
/// reads state.
#[derive(Debug, new)]
pub struct ProgressMonitor {
    tracker: Arc<SyncTracker>,
    metrics: ObserverMetrics,
    interval: Duration,
}

impl ProgressMonitor {
    /// Spawn the monitor task.
    pub fn spawn(self) -> Instrumented<JoinHandle<Result<()>>> {
        let span = info_span!("ProgressMonitor");
        tokio::spawn(async move {
            loop {
                let state = self.tracker.snapshot();
                self.metrics
                    .last_synced_block
                    .set(state.last_synced_block as i64);
                self.metrics.target_block.set(state.target_block as i64);
                info!(
                    phase = ?state.phase,
                    last_synced_block = state.last_synced_block,
                    target_block = state.target_block,
                    percent = format!("{:.1}", state.progress() * 100.0),
                    "sync progress"
                );
                sleep(self.interval).await;
            }
        })
        .instrument(span)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_catch_up_times() {
        assert_eq!(fmt_catch_up_time(Duration::from_secs(42)), "42s");
        assert_eq!(fmt_catch_up_time(Duration::from_secs(125)), "2m 5s");
        assert_eq!(fmt_catch_up_time(Duration::from_secs(7_260)), "2h 1m");
        assert_eq!(
            fmt_catch_up_time(Duration::from_secs(60 * 60 * 24 * 366)),
            "over a year"
        );
    }

    #[test]
    fn eta_caps_when_losing_ground() {
        let mut eta = CatchUpEtaCalculator::new(0, 1_000, 60.0);
        // The tip advanced more than the walk did.
        let estimate = eta.calculate(10, 2_000);
        assert!(estimate >= Duration::from_secs(60 * 60 * 24 * 365));
    }

    #[test]
    fn eta_shrinks_as_blocks_are_covered() {
        let mut eta = CatchUpEtaCalculator::new(0, 1_000, 60.0);
        std::thread::sleep(Duration::from_millis(20));
        let first = eta.calculate(500, 1_000);
        assert!(first > Duration::ZERO);
        std::thread::sleep(Duration::from_millis(20));
        let second = eta.calculate(1_000, 1_000);
        assert_eq!(second, Duration::ZERO);
    }
}
