//! Self-monitoring counters for the check loop
//!
//! Tracks how check cycles and notifications have fared since startup so the
//! scheduler can log a running summary after every cycle.

use crate::cycle::CycleReport;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;

/// Running totals of cycle outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles that processed every unit
    pub successful_cycles: u64,
    /// Cycles aborted by an error
    pub failed_cycles: u64,
    /// Failures since the last successful cycle
    pub consecutive_failures: u64,
    /// Notifications delivered across all cycles
    pub notifications_sent: u64,
    /// When the last successful cycle finished
    pub last_success: Option<DateTime<Utc>>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful cycle
    pub fn record_success(&mut self, report: &CycleReport) {
        self.record_success_at(report, Utc::now());
    }

    /// Record a successful cycle finishing at a specific time
    pub fn record_success_at(&mut self, report: &CycleReport, finished: DateTime<Utc>) {
        self.successful_cycles += 1;
        self.consecutive_failures = 0;
        self.notifications_sent += report.notifications_sent as u64;
        self.last_success = Some(finished);
        debug!(
            "Cycle recorded: {} units, {} notifications",
            report.units_checked, report.notifications_sent
        );
    }

    /// Record an aborted cycle
    pub fn record_failure(&mut self) {
        self.failed_cycles += 1;
        self.consecutive_failures += 1;
    }

    /// Log the running totals
    pub fn log_summary(&self) {
        info!(
            "Cycles: {} ok, {} failed; notifications sent: {}",
            self.successful_cycles, self.failed_cycles, self.notifications_sent
        );

        if self.consecutive_failures > 0 {
            warn!(
                "{} consecutive failed cycle(s), last success: {}",
                self.consecutive_failures,
                self.last_success_description()
            );
        }
    }

    fn last_success_description(&self) -> String {
        match (self.last_success, self.since_last_success()) {
            (Some(at), Some(elapsed)) => format!(
                "{} ({} minute(s) ago)",
                at.format("%Y-%m-%d %H:%M:%S"),
                elapsed.as_secs() / 60
            ),
            (Some(at), None) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            (None, _) => "none since startup".to_string(),
        }
    }

    /// Time since the last successful cycle, if there was one
    pub fn since_last_success(&self) -> Option<Duration> {
        self.last_success
            .and_then(|t| (Utc::now() - t).to_std().ok())
    }
}
