//! Fixed-capacity reading ring
//!
//! A [`ReadingRing`] always holds exactly [`HISTORY_CAPACITY`] slots. Slots
//! start out empty and are filled from the newest end as readings arrive;
//! the only way to insert is [`ReadingRing::advance`], which evicts the oldest
//! slot in the same step.

use crate::error::HistoryError;
use crate::readings::Reading;
use std::collections::VecDeque;

/// Number of readings kept per unit
pub const HISTORY_CAPACITY: usize = 10;

/// Bounded, chronologically ordered history of one unit
///
/// Index 0 is the oldest slot, the back of the ring is the newest.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRing {
    slots: VecDeque<Option<Reading>>,
}

impl Default for ReadingRing {
    fn default() -> Self {
        Self::empty()
    }
}

impl ReadingRing {
    /// Create a ring filled with empty slots
    pub fn empty() -> Self {
        Self {
            slots: std::iter::repeat(None).take(HISTORY_CAPACITY).collect(),
        }
    }

    /// Rebuild a ring from persisted slots, oldest first
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::LengthMismatch` unless exactly
    /// [`HISTORY_CAPACITY`] slots are supplied.
    pub fn from_slots(unit_id: &str, slots: Vec<Option<Reading>>) -> Result<Self, HistoryError> {
        if slots.len() != HISTORY_CAPACITY {
            return Err(HistoryError::LengthMismatch {
                unit_id: unit_id.to_string(),
                expected: HISTORY_CAPACITY,
                actual: slots.len(),
            });
        }
        Ok(Self {
            slots: slots.into(),
        })
    }

    /// Append a reading and evict the oldest slot
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::LengthMismatch` if the ring has drifted from its
    /// fixed length. The ring is left untouched in that case.
    pub fn advance(&mut self, unit_id: &str, reading: Reading) -> Result<(), HistoryError> {
        if self.slots.len() != HISTORY_CAPACITY {
            return Err(HistoryError::LengthMismatch {
                unit_id: unit_id.to_string(),
                expected: HISTORY_CAPACITY,
                actual: self.slots.len(),
            });
        }
        self.slots.pop_front();
        self.slots.push_back(Some(reading));
        Ok(())
    }

    /// Recorded readings, most recent first
    ///
    /// Iteration stops at the first empty slot. Each call returns a fresh
    /// iterator.
    pub fn recent(&self) -> impl Iterator<Item = &Reading> + '_ {
        self.slots.iter().rev().map_while(|slot| slot.as_ref())
    }

    /// All slots including empty ones, oldest first
    pub fn slots(&self) -> impl Iterator<Item = &Option<Reading>> + '_ {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(n: usize) -> Reading {
        Reading::new("A101", n as f64, format!(" A101房间剩余电量{}", n))
    }

    #[test]
    fn test_empty_ring_has_full_length() {
        let ring = ReadingRing::empty();
        assert_eq!(ring.len(), HISTORY_CAPACITY);
        assert!(ring.is_empty());
        assert_eq!(ring.recent().count(), 0);
    }

    #[test]
    fn test_advance_keeps_last_ten() {
        let mut ring = ReadingRing::empty();
        for n in 1..=15 {
            ring.advance("A101", reading(n)).unwrap();
        }

        assert_eq!(ring.len(), HISTORY_CAPACITY);
        let quantities: Vec<f64> = ring.recent().map(|r| r.quantity).collect();
        let expected: Vec<f64> = (6..=15).rev().map(|n| n as f64).collect();
        assert_eq!(quantities, expected);
    }

    #[test]
    fn test_partial_fill_returns_only_recorded() {
        let mut ring = ReadingRing::empty();
        for n in 1..=3 {
            ring.advance("A101", reading(n)).unwrap();
        }

        let quantities: Vec<f64> = ring.recent().map(|r| r.quantity).collect();
        assert_eq!(quantities, vec![3.0, 2.0, 1.0]);
        // Oldest slots are still empty
        assert!(ring.slots().next().unwrap().is_none());
    }

    #[test]
    fn test_recent_is_restartable() {
        let mut ring = ReadingRing::empty();
        ring.advance("A101", reading(1)).unwrap();
        ring.advance("A101", reading(2)).unwrap();

        let first: Vec<f64> = ring.recent().map(|r| r.quantity).collect();
        let second: Vec<f64> = ring.recent().map(|r| r.quantity).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_slots_rejects_wrong_length() {
        let result = ReadingRing::from_slots("A101", vec![None; 3]);
        assert_eq!(
            result,
            Err(HistoryError::LengthMismatch {
                unit_id: "A101".to_string(),
                expected: HISTORY_CAPACITY,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_advance_detects_drift() {
        let mut ring = ReadingRing {
            slots: VecDeque::from(vec![None; 4]),
        };
        let result = ring.advance("A101", reading(1));
        assert!(matches!(
            result,
            Err(HistoryError::LengthMismatch { actual: 4, .. })
        ));
        assert_eq!(ring.len(), 4);
    }
}

// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    // The ring always holds the newest min(n, capacity) readings in reverse order
    #[quickcheck]
    fn prop_ring_keeps_newest_readings(count: u8) -> bool {
        let count = count as usize % 40;
        let mut ring = ReadingRing::empty();
        for n in 0..count {
            if ring
                .advance("A101", Reading::new("A101", n as f64, ""))
                .is_err()
            {
                return false;
            }
        }

        let kept: Vec<f64> = ring.recent().map(|r| r.quantity).collect();
        let expected: Vec<f64> = (0..count)
            .rev()
            .take(HISTORY_CAPACITY)
            .map(|n| n as f64)
            .collect();

        ring.len() == HISTORY_CAPACITY && kept == expected
    }
}
