//! Process supervision
//!
//! [`Daemon`] owns the monitoring state for the lifetime of the process. It
//! restores the state on startup, hands it to the scheduler task, and on
//! shutdown waits for any in-flight cycle before writing the snapshot.

use crate::cycle::{CheckCycle, CycleReport};
use crate::error::{CycleError, PersistenceError};
use crate::persistence::PersistenceManager;
use crate::readings::MonitoredUnit;
use crate::scheduler::Scheduler;
use crate::state::MonitorState;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Supervisor for the scheduler task and the persisted state
pub struct Daemon {
    state: Arc<Mutex<MonitorState>>,
    persistence: PersistenceManager,
    scheduler: Option<JoinHandle<Result<(), CycleError>>>,
}

impl Daemon {
    /// Create the daemon and restore any persisted state
    ///
    /// A missing snapshot or one that cannot be read leaves every unit with
    /// fresh state; neither stops startup.
    pub fn new(units: &[MonitoredUnit], persistence: PersistenceManager) -> Self {
        let mut state = MonitorState::initialize(units);

        match persistence.load() {
            Ok(Some(snapshot)) => {
                let summary = state.restore(snapshot);
                info!(
                    "Restored state for {} unit(s) ({} ignored, {} histories discarded)",
                    summary.restored, summary.ignored, summary.rejected
                );
            }
            Ok(None) => info!(
                "No snapshot at {}, starting with fresh state",
                persistence.path().display()
            ),
            Err(e) => error!("{}; starting with fresh state", e),
        }

        Self {
            state: Arc::new(Mutex::new(state)),
            persistence,
            scheduler: None,
        }
    }

    /// Shared handle to the monitoring state
    pub fn state(&self) -> Arc<Mutex<MonitorState>> {
        Arc::clone(&self.state)
    }

    /// Spawn the scheduler task
    pub fn start(&mut self, scheduler: Scheduler, cycle: CheckCycle) {
        if self.scheduler.is_some() {
            warn!("Scheduler already running, ignoring start request");
            return;
        }
        self.scheduler = Some(tokio::spawn(scheduler.run(cycle, self.state())));
    }

    /// Run a single cycle outside the scheduler
    pub async fn run_once(&self, cycle: &CheckCycle) -> Result<CycleReport, CycleError> {
        let mut state = self.state.lock().await;
        cycle.run(&mut state).await
    }

    /// Run a single cycle, letting it finish if `shutdown_signal` fires first
    ///
    /// The cycle is never cut short; the signal only means the caller should
    /// save and exit afterwards, which it does anyway in this mode.
    pub async fn run_once_until<F>(
        &self,
        cycle: &CheckCycle,
        shutdown_signal: F,
    ) -> Result<CycleReport, CycleError>
    where
        F: Future<Output = ()>,
    {
        let run = self.run_once(cycle);
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            _ = shutdown_signal => {}
        }

        info!("Received exit signal, finishing the current check cycle before saving");
        run.await
    }

    /// Stop scheduling and persist the state
    ///
    /// Waits for an in-flight cycle to finish before taking the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Write` if the snapshot could not be saved.
    /// The failure is already logged; callers are expected to exit anyway.
    pub async fn shutdown(&mut self) -> Result<(), PersistenceError> {
        let state = self.state.lock().await;
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
        }

        let result = self.persistence.save(&state.snapshot());
        if let Err(ref e) = result {
            error!("{}; exiting without saving state", e);
        }
        result
    }

    /// Run until `shutdown_signal` resolves or the scheduler fails fatally
    ///
    /// On the signal the state is persisted. A fatal scheduler error is
    /// returned without persisting, since the state is no longer trustworthy.
    pub async fn run_until<F>(mut self, shutdown_signal: F) -> Result<(), CycleError>
    where
        F: Future<Output = ()>,
    {
        let Some(mut handle) = self.scheduler.take() else {
            shutdown_signal.await;
            let _ = self.shutdown().await;
            return Ok(());
        };

        let joined = tokio::select! {
            _ = shutdown_signal => None,
            joined = &mut handle => Some(joined),
        };

        match joined {
            None => {
                info!("Received exit signal, saving state before exit");
                self.scheduler = Some(handle);
                // Failure is logged by shutdown and does not change the exit path
                let _ = self.shutdown().await;
                Ok(())
            }
            Some(Ok(result)) => result,
            Some(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Some(Err(e)) => {
                warn!("Scheduler task ended unexpectedly: {}", e);
                Ok(())
            }
        }
    }
}
