use crate::error::HistoryError;
use crate::history::ReadingRing;
use crate::readings::{MonitoredUnit, Reading};
use std::collections::BTreeMap;

/// Per-unit reading history
///
/// Holds one [`ReadingRing`] for every configured unit. Rings are created up
/// front by [`HistoryStore::initialize`]; advancing a unit that was never
/// initialized is an invariant violation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStore {
    rings: BTreeMap<String, ReadingRing>,
}

impl HistoryStore {
    /// Create an empty ring for every configured unit
    pub fn initialize(units: &[MonitoredUnit]) -> Self {
        let rings = units
            .iter()
            .map(|unit| (unit.id.clone(), ReadingRing::empty()))
            .collect();
        Self { rings }
    }

    /// Record a reading for a unit, evicting its oldest entry
    pub fn advance(&mut self, unit_id: &str, reading: Reading) -> Result<(), HistoryError> {
        self.rings
            .get_mut(unit_id)
            .ok_or_else(|| HistoryError::UnknownUnit(unit_id.to_string()))?
            .advance(unit_id, reading)
    }

    /// Recorded readings of a unit, most recent first
    ///
    /// Unknown units yield an empty sequence.
    pub fn recent<'a>(&'a self, unit_id: &str) -> impl Iterator<Item = &'a Reading> + 'a {
        self.rings
            .get(unit_id)
            .into_iter()
            .flat_map(|ring| ring.recent())
    }

    /// Replace the ring of a configured unit with persisted slots
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::UnknownUnit` for units that are not configured and
    /// `HistoryError::LengthMismatch` for slot lists of the wrong length. The
    /// existing ring is kept in both cases.
    pub fn restore(
        &mut self,
        unit_id: &str,
        slots: Vec<Option<Reading>>,
    ) -> Result<(), HistoryError> {
        let ring = self
            .rings
            .get_mut(unit_id)
            .ok_or_else(|| HistoryError::UnknownUnit(unit_id.to_string()))?;
        *ring = ReadingRing::from_slots(unit_id, slots)?;
        Ok(())
    }

    pub fn ring(&self, unit_id: &str) -> Option<&ReadingRing> {
        self.rings.get(unit_id)
    }

    /// Iterate over all units and their rings in unit id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReadingRing)> + '_ {
        self.rings.iter().map(|(id, ring)| (id.as_str(), ring))
    }
}
