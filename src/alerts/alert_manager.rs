use crate::alerts::notifier::Notifier;
use crate::alerts::render::MessageRenderer;
use crate::alerts::tiers::Tier;
use crate::error::CycleError;
use crate::readings::{MonitoredUnit, Reading};
use log::{error, info, warn};
use std::sync::Arc;

/// Renders threshold notifications and delivers them to a unit's recipients
///
/// Delivery is best effort: every recipient gets a single attempt, and the
/// first failure stops delivery for the remaining recipients and is reported
/// to the caller.
pub struct AlertManager {
    notifier: Arc<dyn Notifier>,
    renderer: MessageRenderer,
}

impl AlertManager {
    pub fn new(notifier: Arc<dyn Notifier>, renderer: MessageRenderer) -> Self {
        Self { notifier, renderer }
    }

    /// Notify every recipient of `unit` that `tier` was crossed
    ///
    /// # Arguments
    ///
    /// * `unit` - The unit whose reading crossed the threshold
    /// * `tier` - The tier that fired
    /// * `reading` - The reading that fired it
    /// * `history` - The unit's recent readings, newest first
    ///
    /// # Returns
    ///
    /// Number of messages delivered
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Delivery` for the first recipient that could not be
    /// reached.
    pub async fn send_alert<'a>(
        &self,
        unit: &MonitoredUnit,
        tier: Tier,
        reading: &Reading,
        history: impl Iterator<Item = &'a Reading>,
    ) -> Result<usize, CycleError> {
        let message = self.renderer.render(tier, reading, history);

        if unit.recipients.is_empty() {
            warn!(
                "Unit {} crossed {} at {:.2} but has no recipients configured",
                unit.id, tier, reading.quantity
            );
            return Ok(0);
        }

        let mut delivered = 0;
        for recipient in &unit.recipients {
            match self.notifier.send(&message, recipient).await {
                Ok(()) => {
                    delivered += 1;
                    info!(
                        "Unit {} ({:.2}, {}): notification sent to {}",
                        unit.id, reading.quantity, tier, recipient
                    );
                }
                Err(e) => {
                    error!(
                        "Unit {} ({:.2}, {}): failed to notify {}: {}",
                        unit.id, reading.quantity, tier, recipient, e
                    );
                    return Err(CycleError::Delivery {
                        unit_id: unit.id.clone(),
                        recipient: recipient.clone(),
                        source: e,
                    });
                }
            }
        }

        Ok(delivered)
    }
}
