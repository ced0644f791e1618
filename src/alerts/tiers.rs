//! Three-level threshold state machine
//!
//! Each unit carries an [`AlertState`] recording which severity tiers have
//! already been notified during the current low episode. [`evaluate`] decides
//! from the current state and the latest reading whether a new notification
//! is due and what the state becomes.

use crate::readings::Reading;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Remaining quantity at or below which tier 1 applies
pub const TIER1_THRESHOLD: f64 = 50.0;
/// Remaining quantity at or below which tier 2 applies
pub const TIER2_THRESHOLD: f64 = 20.0;
/// Remaining quantity at or below which tier 3 applies
pub const TIER3_THRESHOLD: f64 = 10.0;

/// Descending severity tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
}

impl Tier {
    pub fn threshold(self) -> f64 {
        match self {
            Tier::Tier1 => TIER1_THRESHOLD,
            Tier::Tier2 => TIER2_THRESHOLD,
            Tier::Tier3 => TIER3_THRESHOLD,
        }
    }

    /// State with every tier up to and including this one marked as sent
    pub fn sent_through(self) -> AlertState {
        AlertState {
            tier1_sent: true,
            tier2_sent: self >= Tier::Tier2,
            tier3_sent: self >= Tier::Tier3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Tier1 => write!(f, "tier 1 (<= {})", TIER1_THRESHOLD),
            Tier::Tier2 => write!(f, "tier 2 (<= {})", TIER2_THRESHOLD),
            Tier::Tier3 => write!(f, "tier 3 (<= {})", TIER3_THRESHOLD),
        }
    }
}

/// Which tiers have been notified in the current low episode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub tier1_sent: bool,
    pub tier2_sent: bool,
    pub tier3_sent: bool,
}

impl AlertState {
    pub const CLEAR: AlertState = AlertState {
        tier1_sent: false,
        tier2_sent: false,
        tier3_sent: false,
    };

    /// Tier 2 implies tier 1, tier 3 implies tier 2
    pub fn is_monotonic(&self) -> bool {
        (!self.tier2_sent || self.tier1_sent) && (!self.tier3_sent || self.tier2_sent)
    }
}

/// Outcome of evaluating one reading against a unit's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// State to store for the unit, regardless of delivery outcome
    pub state: AlertState,
    /// Tier to notify about, if any
    pub fired: Option<Tier>,
}

/// Decide the next alert state for a reading
///
/// Above the tier 1 threshold the state is cleared silently. At or below it,
/// at most one tier fires per reading: the first tier not yet sent whose
/// condition holds, where tier 2 and tier 3 additionally require the previous
/// tier to have been sent already. A reading that drops straight below tier 3
/// therefore only fires tier 1; the deeper tiers follow on later readings.
pub fn evaluate(current: AlertState, reading: &Reading) -> Evaluation {
    let quantity = reading.quantity;

    if quantity > TIER1_THRESHOLD {
        return Evaluation {
            state: AlertState::CLEAR,
            fired: None,
        };
    }

    let fired = if !current.tier1_sent {
        Some(Tier::Tier1)
    } else if !current.tier2_sent && quantity <= TIER2_THRESHOLD {
        Some(Tier::Tier2)
    } else if !current.tier3_sent && quantity <= TIER3_THRESHOLD {
        Some(Tier::Tier3)
    } else {
        None
    };

    Evaluation {
        state: fired.map(Tier::sent_through).unwrap_or(current),
        fired,
    }
}

/// Alert state of every unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertBook {
    states: BTreeMap<String, AlertState>,
}

impl AlertBook {
    /// Clear state for every given unit id
    pub fn initialize<'a>(unit_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            states: unit_ids
                .into_iter()
                .map(|id| (id.to_string(), AlertState::CLEAR))
                .collect(),
        }
    }

    /// Current state of a unit; units never seen are clear
    pub fn get(&self, unit_id: &str) -> AlertState {
        self.states.get(unit_id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, unit_id: &str, state: AlertState) {
        self.states.insert(unit_id.to_string(), state);
    }

    /// Evaluate a reading and store the resulting state
    pub fn evaluate(&mut self, unit_id: &str, reading: &Reading) -> Evaluation {
        let evaluation = evaluate(self.get(unit_id), reading);
        self.set(unit_id, evaluation.state);
        evaluation
    }

    pub fn contains(&self, unit_id: &str) -> bool {
        self.states.contains_key(unit_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AlertState)> + '_ {
        self.states.iter().map(|(id, state)| (id.as_str(), *state))
    }
}
