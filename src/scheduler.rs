//! Check cycle scheduling
//!
//! The scheduler runs one check cycle at a time. After a successful cycle it
//! waits the normal interval; after a failed one it switches to the shorter
//! retry interval and stays there until a cycle succeeds again. Retries are
//! unbounded. Only an invariant violation ends the loop.

use crate::cycle::{CheckCycle, CycleReport};
use crate::error::CycleError;
use crate::monitoring::CycleStats;
use crate::state::MonitorState;
use chrono::Local;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default interval between successful cycles
pub const NORMAL_INTERVAL: Duration = Duration::from_secs(8 * 60 * 60);

/// Default interval between retries after a failed cycle
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Scheduling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Last cycle succeeded
    Normal,
    /// Last cycle failed; retrying on the short interval
    Degraded,
}

/// Drives [`CheckCycle`] on a steady interval with a degraded retry interval
#[derive(Debug)]
pub struct Scheduler {
    normal_interval: Duration,
    retry_interval: Duration,
    mode: ScheduleMode,
    stats: CycleStats,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(NORMAL_INTERVAL, RETRY_INTERVAL)
    }
}

impl Scheduler {
    pub fn new(normal_interval: Duration, retry_interval: Duration) -> Self {
        Self {
            normal_interval,
            retry_interval,
            mode: ScheduleMode::Normal,
            stats: CycleStats::new(),
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Delay before the next cycle in the current mode
    pub fn next_delay(&self) -> Duration {
        match self.mode {
            ScheduleMode::Normal => self.normal_interval,
            ScheduleMode::Degraded => self.retry_interval,
        }
    }

    /// Apply a cycle outcome and return the delay before the next cycle
    ///
    /// # Errors
    ///
    /// Hands back fatal cycle errors; the caller must stop scheduling.
    pub fn on_cycle_result(
        &mut self,
        result: Result<CycleReport, CycleError>,
    ) -> Result<Duration, CycleError> {
        match result {
            Ok(report) => {
                self.stats.record_success(&report);
                if self.mode == ScheduleMode::Degraded {
                    info!("Check cycle recovered, returning to the normal interval");
                }
                self.mode = ScheduleMode::Normal;
            }
            Err(e) if e.is_fatal() => {
                error!("Check cycle hit an unrecoverable error: {}", e);
                return Err(e);
            }
            Err(e) => {
                self.stats.record_failure();
                error!("Check cycle failed: {}", e);
                if self.mode == ScheduleMode::Normal {
                    warn!(
                        "Retrying every {} minute(s) until a check cycle succeeds",
                        self.retry_interval.as_secs() / 60
                    );
                }
                self.mode = ScheduleMode::Degraded;
            }
        }
        self.stats.log_summary();
        Ok(self.next_delay())
    }

    /// Run check cycles until a fatal error occurs
    ///
    /// The state lock is held for the whole of each cycle and released while
    /// sleeping, so anyone else taking the lock waits for an in-flight cycle
    /// to finish.
    pub async fn run(
        mut self,
        cycle: CheckCycle,
        state: Arc<Mutex<MonitorState>>,
    ) -> Result<(), CycleError> {
        info!(
            "Scheduler started for {} unit(s): interval {:?}, retry {:?}",
            cycle.units().len(),
            self.normal_interval,
            self.retry_interval
        );

        loop {
            info!("Executing check cycle");
            let result = {
                let mut guard = state.lock().await;
                cycle.run(&mut guard).await
            };

            let delay = self.on_cycle_result(result)?;
            match chrono::Duration::from_std(delay) {
                Ok(offset) => info!(
                    "Next check cycle scheduled at {}",
                    (Local::now() + offset).format("%Y-%m-%d %H:%M:%S")
                ),
                Err(_) => info!("Next check cycle in {:?}", delay),
            }
            tokio::time::sleep(delay).await;
        }
    }
}
