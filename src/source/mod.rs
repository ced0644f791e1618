//! Reading sources
//!
//! A reading source produces one [`Reading`] per unit per check cycle. Any
//! failure is fatal to the cycle that asked for it.

pub mod http;

pub use http::HttpReadingSource;

use crate::error::ReadingError;
use crate::readings::{MonitoredUnit, Reading};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for reading source implementations
pub trait ReadingSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        unit: &'a MonitoredUnit,
    ) -> Pin<Box<dyn Future<Output = Result<Reading, ReadingError>> + Send + 'a>>;
}

/// Mock reading source for testing
///
/// Each unit has a script of quantities (or errors) consumed one per fetch.
/// Once a unit's script runs out its last entry repeats. Units without a
/// script fail with a transport error. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct MockReadingSource {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Result<f64, ReadingError>>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockReadingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue quantities for a unit
    pub fn with_quantities(self, unit_id: &str, quantities: &[f64]) -> Self {
        self.script(unit_id, quantities.iter().map(|&q| Ok(q)).collect());
        self
    }

    /// Delay every fetch, to simulate a slow endpoint
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a failure for a unit
    pub fn with_failure(self, unit_id: &str, error: ReadingError) -> Self {
        self.script(unit_id, vec![Err(error)]);
        self
    }

    fn script(&self, unit_id: &str, entries: Vec<Result<f64, ReadingError>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(unit_id.to_string())
            .or_default()
            .extend(entries);
    }

    /// Unit ids in the order they were fetched
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl ReadingSource for MockReadingSource {
    fn fetch<'a>(
        &'a self,
        unit: &'a MonitoredUnit,
    ) -> Pin<Box<dyn Future<Output = Result<Reading, ReadingError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.fetched.lock().unwrap().push(unit.id.clone());

            let next = {
                let mut scripts = self.scripts.lock().unwrap();
                match scripts.get_mut(&unit.id) {
                    Some(script) if script.len() > 1 => script.pop_front(),
                    Some(script) => script.front().cloned(),
                    None => None,
                }
            };

            match next {
                Some(Ok(quantity)) => Ok(Reading::new(
                    unit.id.clone(),
                    quantity,
                    format!(" {}房间剩余电量{}", unit.id, quantity),
                )),
                Some(Err(e)) => Err(e),
                None => Err(ReadingError::Transport(format!(
                    "no scripted reading for {}",
                    unit.id
                ))),
            }
        })
    }
}
