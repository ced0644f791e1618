//! Core data types for monitored units and their readings
//!
//! This module defines the fundamental data structures shared by the history
//! ring, the alert state machine, the reading source and the snapshot format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// A unit under observation, taken from configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoredUnit {
    /// Identity key of the unit (e.g. a room number)
    pub id: String,
    /// Grouping attribute used only to build fetch requests
    pub building: String,
    /// Addresses notified when the unit crosses a threshold
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl MonitoredUnit {
    pub fn new(id: impl Into<String>, building: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            building: building.into(),
            recipients: Vec::new(),
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }
}

/// A single remaining-quantity reading for one unit
///
/// Produced once per unit per cycle and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Unit the reading belongs to
    pub unit_id: String,
    /// Remaining quantity, non-negative
    pub quantity: f64,
    /// When the reading was taken
    pub timestamp: Timestamp,
    /// Text the quantity was parsed from
    pub raw: String,
}

impl Reading {
    pub fn new(unit_id: impl Into<String>, quantity: f64, raw: impl Into<String>) -> Self {
        Self::at(unit_id, quantity, Utc::now(), raw)
    }

    pub fn at(
        unit_id: impl Into<String>,
        quantity: f64,
        timestamp: Timestamp,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            quantity,
            timestamp,
            raw: raw.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_serialization() {
        let reading = Reading::new("A101", 42.5, " A101房间剩余电量42.5");

        let json = serde_json::to_string(&reading).unwrap();
        let deserialized: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(reading, deserialized);
    }

    #[test]
    fn test_unit_recipients_default_to_empty() {
        let unit: MonitoredUnit =
            toml::from_str("id = \"A101\"\nbuilding = \"7\"").unwrap();
        assert_eq!(unit, MonitoredUnit::new("A101", "7"));
        assert!(unit.recipients.is_empty());
    }
}
