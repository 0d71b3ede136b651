//! Plan/progress state machine over the persisted step list.
//!
//! Steps live in a [`KeyedLog`]; the position lives in the progress file.
//! Every operation re-reads both from disk, so a restarted process continues
//! exactly where the last persisted advance left off.

use tracing::{debug, info, instrument, warn};

use crate::core::progress::Progress;
use crate::core::types::{AdvanceOutcome, FinishedStep, Next, Step};
use crate::error::ResearchError;
use crate::io::keyed_log::{KeyedLog, LogError};
use crate::io::progress_store::{ProgressState, ProgressStore};

/// Owns the step log and the progress state.
#[derive(Debug)]
pub struct PlanTracker<L: KeyedLog> {
    log: L,
    progress: ProgressStore,
}

impl<L: KeyedLog> PlanTracker<L> {
    pub fn new(log: L, progress: ProgressStore) -> Self {
        Self { log, progress }
    }

    /// Append a step during planning.
    ///
    /// The returned ordinal is the step's position in the plan, the same
    /// number [`Self::load_steps`] gives it, even when stored keys have gaps.
    #[instrument(skip_all)]
    pub fn add_step(&self, text: &str) -> Result<Step, ResearchError> {
        let key = self.log.append(text).map_err(append_error)?;
        let ordinal = position(self.log.entries().map_err(append_error)?.len());
        info!(ordinal, key, step = %text, "step created");
        Ok(Step {
            ordinal,
            text: text.to_string(),
        })
    }

    /// All steps; a missing or unreadable plan lists as empty.
    pub fn list_steps(&self) -> Vec<Step> {
        match self.load_steps() {
            Ok(steps) => steps,
            Err(err) => {
                debug!(err = %err, "listing plan as empty");
                Vec::new()
            }
        }
    }

    /// All steps, failing when the plan is missing or unreadable.
    pub fn load_steps(&self) -> Result<Vec<Step>, ResearchError> {
        let entries = self.log.entries().map_err(plan_error)?;
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| Step {
                ordinal: position(idx + 1),
                text: entry.value,
            })
            .collect())
    }

    pub fn has_plan(&self) -> bool {
        self.log.exists()
    }

    /// Current position, re-read from disk.
    pub fn counts(&self) -> Result<Progress, ResearchError> {
        let total = position(self.load_steps()?.len());
        let state = self.progress.load()?;
        Ok(self.position_of(state, total))
    }

    /// The active step, or `None` before the first advance or without a plan.
    pub fn get_current(&self) -> Result<Option<Step>, ResearchError> {
        let state = self.progress.load()?;
        let steps = self.list_steps();
        let progress = self.position_of(state, position(steps.len()));
        Ok(progress.active().map(|n| steps[n as usize - 1].clone()))
    }

    /// Report `result` for the active step and move to the next one.
    ///
    /// Once the last step has been reached this keeps returning
    /// [`Next::Complete`] without moving.
    #[instrument(skip_all)]
    pub fn advance(&self, result: &str) -> Result<AdvanceOutcome, ResearchError> {
        let steps = self.load_steps()?;
        let state = self.progress.load()?;
        let progress = self.position_of(state, position(steps.len()));
        let step_at = |n: u32| steps[n as usize - 1].clone();

        let (moved, transition) = progress.advance();
        let finished = transition.finished.map(|n| FinishedStep {
            step: step_at(n),
            result: result.to_string(),
        });
        if let Some(done) = &finished {
            info!(step = done.step.ordinal, text = %done.step.text, result = %done.result, "step finished");
        }

        if transition.moved {
            self.progress.write(ProgressState {
                current_step: moved.current(),
            })?;
        }

        let next = match transition.next {
            Some(n) => {
                let step = step_at(n);
                info!(step = step.ordinal, text = %step.text, "next step");
                Next::Step(step)
            }
            None => {
                info!(total = progress.total(), "research plan complete");
                Next::Complete
            }
        };
        Ok(AdvanceOutcome { finished, next })
    }

    /// Discard the plan and progress.
    pub fn reset(&self) -> Result<(), ResearchError> {
        self.log.clear().map_err(append_error)?;
        self.progress.clear()
    }

    fn position_of(&self, state: ProgressState, total: u32) -> Progress {
        if state.current_step > total {
            warn!(
                current_step = state.current_step,
                total,
                path = %self.progress.path().display(),
                "progress beyond plan length, treating as complete"
            );
        }
        Progress::new(state.current_step, total)
    }
}

fn position(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn plan_error(err: LogError) -> ResearchError {
    match err {
        LogError::Missing(path) => ResearchError::MissingOrCorruptPlan {
            path,
            reason: "not found".to_string(),
        },
        LogError::Corrupt { path, reason } => ResearchError::MissingOrCorruptPlan { path, reason },
        LogError::Io { context, source } => ResearchError::Io { context, source },
    }
}

pub(crate) fn append_error(err: LogError) -> ResearchError {
    match err {
        LogError::Corrupt { path, reason } => ResearchError::CorruptLog { path, reason },
        LogError::Missing(path) => ResearchError::CorruptLog {
            path,
            reason: "not found".to_string(),
        },
        LogError::Io { context, source } => ResearchError::Io { context, source },
    }
}
