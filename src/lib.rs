/// Error types for the meter watcher
pub mod error;

/// Monitored units and their readings
pub mod readings;

/// Fixed-length reading history per unit
pub mod history;

/// Tiered alert state, message rendering and delivery
pub mod alerts;

/// Reading sources
pub mod source;

/// Configuration management
pub mod config;

/// Combined history and alert state
pub mod state;

/// Snapshot persistence across restarts
pub mod persistence;

/// Single check cycle over all units
pub mod cycle;

/// Interval scheduling with degraded retry
pub mod scheduler;

/// Cycle statistics
pub mod monitoring;

/// Process supervision and graceful shutdown
pub mod daemon;

// Re-export commonly used types
pub use error::{
    ConfigError, CycleError, DeliveryError, HistoryError, PersistenceError, ReadingError,
};
pub use readings::{MonitoredUnit, Reading};
