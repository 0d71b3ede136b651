//! Domain error taxonomy for the research workflow.
//!
//! Orchestration code works in `anyhow::Result`; callers that need to branch
//! on a specific failure (exit codes, tool refusals) downcast to
//! [`ResearchError`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    /// Plan log is absent or cannot be parsed.
    #[error("research plan missing or invalid at {path}: {reason}")]
    MissingOrCorruptPlan { path: PathBuf, reason: String },

    /// Progress file exists but cannot be parsed.
    #[error("progress state invalid at {path}: {reason}")]
    CorruptProgress { path: PathBuf, reason: String },

    /// A keyed log exists but cannot be parsed, so it cannot be appended to.
    #[error("log {path} is unreadable: {reason}")]
    CorruptLog { path: PathBuf, reason: String },

    /// Report requested before every step was reached.
    #[error("research incomplete: current={current}, N={total}")]
    ReportIncomplete { current: u32, total: u32 },

    /// Report title sanitized to nothing.
    #[error("invalid report title {title:?}: no filename-safe characters")]
    InvalidTitle { title: String },

    /// `finish_plan` called before any step was created.
    #[error("research plan has no steps")]
    EmptyPlan,

    /// Planning tool used after the plan was finished.
    #[error("research plan is frozen; steps cannot be added")]
    PlanFrozen,

    /// Tool not available in the current session phase.
    #[error("tool {tool} is not available during {phase}")]
    ToolUnavailable { tool: String, phase: String },

    /// Persistence failure; on-disk state may be inconsistent.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ResearchError {
    /// Whether the caller can recover by changing its request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ReportIncomplete { .. }
                | Self::InvalidTitle { .. }
                | Self::EmptyPlan
                | Self::PlanFrozen
                | Self::ToolUnavailable { .. }
        )
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_names_both_counts() {
        let err = ResearchError::ReportIncomplete {
            current: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "research incomplete: current=2, N=5");
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_plan_is_fatal() {
        let err = ResearchError::MissingOrCorruptPlan {
            path: PathBuf::from("research_plans/plan.json"),
            reason: "not found".to_string(),
        };
        assert!(!err.is_recoverable());
    }
}
