//! One poll-evaluate-notify pass over every monitored unit

use crate::alerts::tiers::TIER1_THRESHOLD;
use crate::alerts::AlertManager;
use crate::error::CycleError;
use crate::readings::MonitoredUnit;
use crate::source::ReadingSource;
use crate::state::MonitorState;
use log::info;
use std::sync::Arc;

/// Outcome of a completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub units_checked: usize,
    pub notifications_sent: usize,
}

/// Runs check cycles over a fixed list of units
///
/// Units are processed in configuration order. The first fetch or delivery
/// failure ends the cycle; updates already applied to earlier units are kept.
pub struct CheckCycle {
    units: Vec<MonitoredUnit>,
    source: Arc<dyn ReadingSource>,
    alert_manager: AlertManager,
}

impl CheckCycle {
    pub fn new(
        units: Vec<MonitoredUnit>,
        source: Arc<dyn ReadingSource>,
        alert_manager: AlertManager,
    ) -> Self {
        Self {
            units,
            source,
            alert_manager,
        }
    }

    pub fn units(&self) -> &[MonitoredUnit] {
        &self.units
    }

    /// Run a single cycle against `state`
    ///
    /// # Errors
    ///
    /// * `CycleError::Reading` if a reading cannot be fetched
    /// * `CycleError::Delivery` if a notification cannot be delivered
    /// * `CycleError::Invariant` if the history of a unit is inconsistent
    pub async fn run(&self, state: &mut MonitorState) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();
        let total = self.units.len();

        for (index, unit) in self.units.iter().enumerate() {
            let reading = self
                .source
                .fetch(unit)
                .await
                .map_err(|source| CycleError::Reading {
                    unit_id: unit.id.clone(),
                    source,
                })?;

            info!(
                "Checked {}/{}: unit {} has {} left at {}",
                index + 1,
                total,
                unit.id,
                reading.quantity,
                reading.timestamp.format("%Y-%m-%d %H:%M:%S")
            );

            state.history.advance(&unit.id, reading.clone())?;

            // Stored before delivery; a failed send does not roll it back
            let evaluation = state.alerts.evaluate(&unit.id, &reading);

            match evaluation.fired {
                Some(tier) => {
                    info!(
                        "Unit {} at {} crossed {}, notifying",
                        unit.id, reading.quantity, tier
                    );
                    report.notifications_sent += self
                        .alert_manager
                        .send_alert(unit, tier, &reading, state.history.recent(&unit.id))
                        .await?;
                }
                None if reading.quantity <= TIER1_THRESHOLD => {
                    info!(
                        "Unit {} is low at {}, already notified for this level",
                        unit.id, reading.quantity
                    );
                }
                None => {
                    info!("Unit {} is adequate at {}", unit.id, reading.quantity);
                }
            }

            report.units_checked += 1;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertState, MessageRenderer, MockNotifier, Tier};
    use crate::error::ReadingError;
    use crate::source::MockReadingSource;

    fn units(n: usize) -> Vec<MonitoredUnit> {
        (1..=n)
            .map(|i| {
                MonitoredUnit::new(format!("U{}", i), "1")
                    .with_recipients(vec![format!("u{}@example.com", i)])
            })
            .collect()
    }

    fn check_cycle(
        units: Vec<MonitoredUnit>,
        source: &MockReadingSource,
        notifier: &MockNotifier,
    ) -> CheckCycle {
        CheckCycle::new(
            units,
            Arc::new(source.clone()),
            AlertManager::new(
                Arc::new(notifier.clone()),
                MessageRenderer::new("{{unit_id}}|{{history_table}}"),
            ),
        )
    }

    #[tokio::test]
    async fn test_cycle_updates_history_and_alerts() {
        let units = units(2);
        let source = MockReadingSource::new()
            .with_quantities("U1", &[45.0])
            .with_quantities("U2", &[120.0]);
        let notifier = MockNotifier::new();
        let cycle = check_cycle(units.clone(), &source, &notifier);
        let mut state = MonitorState::initialize(&units);

        let report = cycle.run(&mut state).await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                units_checked: 2,
                notifications_sent: 1
            }
        );
        assert_eq!(state.alerts.get("U1"), Tier::Tier1.sent_through());
        assert_eq!(state.alerts.get("U2"), AlertState::CLEAR);
        assert_eq!(state.history.recent("U1").count(), 1);
        assert_eq!(state.history.recent("U2").count(), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "u1@example.com");
        assert!(sent[0].message.body.starts_with("U1|<table"));
    }

    #[tokio::test]
    async fn test_staggered_descent_across_cycles() {
        let units = units(1);
        let source = MockReadingSource::new().with_quantities("U1", &[60.0, 45.0, 15.0, 8.0]);
        let notifier = MockNotifier::new();
        let cycle = check_cycle(units.clone(), &source, &notifier);
        let mut state = MonitorState::initialize(&units);

        let mut sent_per_cycle = Vec::new();
        for _ in 0..4 {
            sent_per_cycle.push(cycle.run(&mut state).await.unwrap().notifications_sent);
        }

        assert_eq!(sent_per_cycle, vec![0, 1, 1, 1]);
        assert_eq!(state.alerts.get("U1"), Tier::Tier3.sent_through());
        // Subjects name the tiers in order
        let subjects: Vec<String> = notifier
            .sent()
            .into_iter()
            .map(|s| s.message.subject)
            .collect();
        assert!(subjects[0].contains("tier 1"));
        assert!(subjects[1].contains("tier 2"));
        assert!(subjects[2].contains("tier 3"));
    }

    #[tokio::test]
    async fn test_reading_failure_aborts_remaining_units() {
        let units = units(5);
        let source = MockReadingSource::new()
            .with_quantities("U1", &[30.0])
            .with_quantities("U2", &[200.0])
            .with_failure("U3", ReadingError::Transport("timeout".to_string()))
            .with_quantities("U4", &[5.0])
            .with_quantities("U5", &[5.0]);
        let notifier = MockNotifier::new();
        let cycle = check_cycle(units.clone(), &source, &notifier);
        let mut state = MonitorState::initialize(&units);

        let result = cycle.run(&mut state).await;

        assert!(matches!(result, Err(CycleError::Reading { unit_id, .. }) if unit_id == "U3"));
        assert_eq!(source.fetched(), vec!["U1", "U2", "U3"]);
        // Progress on units 1 and 2 is kept
        assert_eq!(state.history.recent("U1").count(), 1);
        assert_eq!(state.history.recent("U2").count(), 1);
        assert_eq!(state.alerts.get("U1"), Tier::Tier1.sent_through());
        // Units 3 to 5 are untouched
        for id in ["U3", "U4", "U5"] {
            assert_eq!(state.history.recent(id).count(), 0);
            assert_eq!(state.alerts.get(id), AlertState::CLEAR);
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_aborts_cycle_but_keeps_state() {
        let units = units(3);
        let source = MockReadingSource::new()
            .with_quantities("U1", &[80.0])
            .with_quantities("U2", &[40.0])
            .with_quantities("U3", &[40.0]);
        let notifier = MockNotifier::failing_for(&["u2@example.com"]);
        let cycle = check_cycle(units.clone(), &source, &notifier);
        let mut state = MonitorState::initialize(&units);

        let result = cycle.run(&mut state).await;

        assert!(matches!(result, Err(CycleError::Delivery { unit_id, .. }) if unit_id == "U2"));
        // Tier flag stays set despite the failed delivery
        assert_eq!(state.alerts.get("U2"), Tier::Tier1.sent_through());
        assert_eq!(state.history.recent("U3").count(), 0);
        assert_eq!(source.fetched(), vec!["U1", "U2"]);

        // Next cycle does not resend tier 1 for U2
        let report = cycle.run(&mut state).await;
        assert!(report.is_ok());
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].recipient, "u3@example.com");
    }

    #[tokio::test]
    async fn test_unknown_unit_is_invariant_violation() {
        let configured = units(1);
        let source = MockReadingSource::new().with_quantities("U1", &[30.0]);
        let notifier = MockNotifier::new();
        let cycle = check_cycle(configured, &source, &notifier);
        // State initialized for a different fleet
        let mut state = MonitorState::initialize(&[MonitoredUnit::new("Other", "1")]);

        let result = cycle.run(&mut state).await;

        assert!(matches!(&result, Err(e) if e.is_fatal()));
        assert_eq!(notifier.attempts(), 0);
    }

    #[tokio::test]
    async fn test_notification_includes_recent_history_newest_first() {
        let units = units(1);
        let source = MockReadingSource::new().with_quantities("U1", &[70.0, 65.0, 49.0]);
        let notifier = MockNotifier::new();
        let cycle = check_cycle(units.clone(), &source, &notifier);
        let mut state = MonitorState::initialize(&units);

        for _ in 0..3 {
            cycle.run(&mut state).await.unwrap();
        }

        let body = &notifier.sent()[0].message.body;
        let newest = body.find(">49<").unwrap();
        let middle = body.find(">65<").unwrap();
        let oldest = body.find(">70<").unwrap();
        assert!(newest < middle && middle < oldest);
    }
}
