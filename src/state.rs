//! Mutable monitoring state owned by the daemon
//!
//! [`MonitorState`] is the single context object holding every unit's
//! history and alert state. The check cycle mutates it; the persistence
//! layer projects it into a [`Snapshot`] and back.

use crate::alerts::AlertBook;
use crate::history::HistoryStore;
use crate::persistence::{Snapshot, UnitSnapshot};
use crate::readings::MonitoredUnit;
use log::warn;

/// History and alert state of every configured unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    pub history: HistoryStore,
    pub alerts: AlertBook,
}

/// What a restore applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Units whose state was taken from the snapshot
    pub restored: usize,
    /// Snapshot entries skipped because the unit is no longer configured
    pub ignored: usize,
    /// Histories rejected for having the wrong length
    pub rejected: usize,
}

impl MonitorState {
    /// Fresh state with empty history and clear alerts for every unit
    pub fn initialize(units: &[MonitoredUnit]) -> Self {
        Self {
            history: HistoryStore::initialize(units),
            alerts: AlertBook::initialize(units.iter().map(|u| u.id.as_str())),
        }
    }

    /// Project the state into a serializable snapshot
    pub fn snapshot(&self) -> Snapshot {
        let units = self
            .history
            .iter()
            .map(|(unit_id, ring)| {
                (
                    unit_id.to_string(),
                    UnitSnapshot {
                        alert: self.alerts.get(unit_id),
                        history: ring.slots().cloned().collect(),
                    },
                )
            })
            .collect();
        Snapshot { units }
    }

    /// Apply a snapshot to the configured units
    ///
    /// Entries for units that are not configured are ignored. A unit whose
    /// persisted history has the wrong length keeps a fresh history but still
    /// gets its alert state back. An alert state with a deeper tier sent but
    /// not a shallower one is replaced by a clear state.
    pub fn restore(&mut self, snapshot: Snapshot) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        for (unit_id, unit) in snapshot.units {
            if !self.alerts.contains(&unit_id) {
                summary.ignored += 1;
                continue;
            }

            if unit.alert.is_monotonic() {
                self.alerts.set(&unit_id, unit.alert);
            } else {
                warn!(
                    "Discarding persisted alert state for {}: {:?} skips a tier",
                    unit_id, unit.alert
                );
            }
            if let Err(e) = self.history.restore(&unit_id, unit.history) {
                warn!("Discarding persisted history: {}", e);
                summary.rejected += 1;
            }
            summary.restored += 1;
        }

        summary
    }
}
