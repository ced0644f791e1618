use thiserror::Error;

/// Errors produced while obtaining a reading from the reading source
#[derive(Error, Debug, Clone)]
pub enum ReadingError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to parse reading: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ReadingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ReadingError::Parse(format!("Malformed response body: {}", e))
        } else {
            ReadingError::Transport(e.to_string())
        }
    }
}

/// Errors that can occur when delivering a notification
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),
}

/// Violations of the history ring invariants
///
/// These indicate a logic defect rather than a runtime condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("No history initialized for unit '{0}'")]
    UnknownUnit(String),

    #[error("History for unit '{unit_id}' has {actual} entries, expected {expected}")]
    LengthMismatch {
        unit_id: String,
        expected: usize,
        actual: usize,
    },
}

/// Errors that abort a check cycle
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Failed to fetch reading for unit '{unit_id}': {source}")]
    Reading {
        unit_id: String,
        #[source]
        source: ReadingError,
    },

    #[error("Failed to notify {recipient} about unit '{unit_id}': {source}")]
    Delivery {
        unit_id: String,
        recipient: String,
        #[source]
        source: DeliveryError,
    },

    #[error("Invariant violation: {0}")]
    Invariant(#[from] HistoryError),
}

impl CycleError {
    /// Whether this error must stop the process instead of degrading the schedule
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Invariant(_))
    }
}

/// Errors raised while loading or saving the state snapshot
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read snapshot {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write snapshot {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Failed to read template: {0}")]
    TemplateError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invariant_violations_are_fatal() {
        let reading = CycleError::Reading {
            unit_id: "A101".to_string(),
            source: ReadingError::Transport("connection refused".to_string()),
        };
        let delivery = CycleError::Delivery {
            unit_id: "A101".to_string(),
            recipient: "a@example.com".to_string(),
            source: DeliveryError::NotificationFailed("550".to_string()),
        };
        let invariant = CycleError::from(HistoryError::UnknownUnit("A101".to_string()));

        assert!(!reading.is_fatal());
        assert!(!delivery.is_fatal());
        assert!(invariant.is_fatal());
    }

    #[test]
    fn test_cycle_error_display_includes_unit() {
        let err = CycleError::Reading {
            unit_id: "B202".to_string(),
            source: ReadingError::Parse("no marker".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("B202"));
        assert!(text.contains("no marker"));
    }
}
