//! Shared deterministic types for the research core.
//!
//! These types define stable contracts between components. They carry no I/O
//! and serialize the same way across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One unit of the research plan, identified by its 1-based ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub ordinal: u32,
    pub text: String,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.ordinal, self.text)
    }
}

/// A step that was just finished, paired with the result reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishedStep {
    pub step: Step,
    pub result: String,
}

/// What `advance` moved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Next {
    Step(Step),
    Complete,
}

/// Full outcome of one `advance` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    /// Outcome of the step that was active before the call, if any.
    pub finished: Option<FinishedStep>,
    pub next: Next,
}

impl AdvanceOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.next, Next::Complete)
    }
}

/// Classification of a span of streamed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanMode {
    Visible,
    Internal,
}

/// A classified run of streamed text. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub mode: SpanMode,
    pub text: String,
}

impl Span {
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            mode: SpanMode::Visible,
            text: text.into(),
        }
    }

    pub fn internal(text: impl Into<String>) -> Self {
        Self {
            mode: SpanMode::Internal,
            text: text.into(),
        }
    }
}

/// One ranked web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(alias = "href")]
    pub url: String,
    #[serde(alias = "body", default)]
    pub snippet: String,
}
