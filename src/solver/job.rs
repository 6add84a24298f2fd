use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use super::{RunSummary, SolvePlan, report_error};
use crate::errors::SolveError;
use crate::events::EventBus;
use crate::results::ResultsEntry;

/// Shared cancel flag, checked between runs and between blocks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    /// Rows committed before any failure.
    pub entry: ResultsEntry,
    pub result: Result<RunSummary, SolveError>,
}

/// A solve plan running on its own thread.
#[derive(Debug)]
pub struct SolveJob {
    cancel: CancellationToken,
    handle: JoinHandle<JobOutcome>,
}

impl SolveJob {
    /// Starts solving immediately. `events` is moved to the worker and
    /// receives status and error events there.
    pub fn spawn(plan: SolvePlan, mut events: EventBus) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || {
            let mut entry = ResultsEntry::new(plan.variable_names());
            let result = plan.run(&mut entry, &token, &mut events);
            if let Err(error) = &result {
                report_error(&mut events, error);
            }
            JobOutcome { entry, result }
        });
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<JobOutcome, SolveError> {
        self.handle.join().map_err(|_| SolveError::WorkerPanicked)
    }
}
