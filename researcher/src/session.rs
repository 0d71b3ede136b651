//! Tool dispatch for one research session.
//!
//! The caller picks the starting phase. A session opened in
//! [`Phase::Planning`] moves to [`Phase::Research`] once `finish_plan`
//! succeeds. The phase is session state, not process state, so independent
//! sessions never interfere.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::ResearchError;
use crate::io::collaborators::Collaborators;
use crate::tools::{NO_ANSWER, Phase, ToolCall, ToolReply, find_spec};
use crate::workspace::Workspace;

pub struct Session<'a, C: Collaborators> {
    workspace: &'a Workspace,
    collaborators: &'a C,
    phase: Phase,
}

impl<'a, C: Collaborators> Session<'a, C> {
    pub fn new(workspace: &'a Workspace, collaborators: &'a C, phase: Phase) -> Self {
        Self {
            workspace,
            collaborators,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Decode and dispatch a raw tool call. Malformed calls are refused.
    pub fn dispatch_json(&mut self, raw: &Value) -> Result<ToolReply> {
        match ToolCall::from_json(raw) {
            Ok(call) => self.dispatch(call),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "malformed tool call");
                Ok(ToolReply::Refused {
                    reason: format!("{err:#}"),
                })
            }
        }
    }

    /// Run one tool call.
    ///
    /// Recoverable failures come back as [`ToolReply::Refused`]; anything
    /// that leaves on-disk state in doubt is returned as an error.
    #[instrument(skip_all, fields(tool = call.name(), phase = %self.phase))]
    pub fn dispatch(&mut self, call: ToolCall) -> Result<ToolReply> {
        match self.execute(call) {
            Ok(reply) => {
                debug!("tool finished");
                Ok(reply)
            }
            Err(err) => match err.downcast_ref::<ResearchError>() {
                Some(research) if research.is_recoverable() => {
                    info!(reason = %research, "tool refused");
                    Ok(ToolReply::Refused {
                        reason: research.to_string(),
                    })
                }
                _ => Err(err),
            },
        }
    }

    fn execute(&mut self, call: ToolCall) -> Result<ToolReply> {
        self.check_phase(&call)?;
        let plan = self.workspace.plan();
        let reply = match call {
            ToolCall::AskQuestion { question } => match self.collaborators.ask_user(&question) {
                Ok(Some(answer)) => ToolReply::Answer { text: answer },
                Ok(None) => ToolReply::Answer {
                    text: NO_ANSWER.to_string(),
                },
                Err(err) => failed("ask_question", &err),
            },
            ToolCall::CreateResearchPlanStep { step } => ToolReply::StepCreated {
                step: plan.add_step(&step)?,
            },
            ToolCall::GetAllSteps {} => ToolReply::Steps {
                steps: plan.list_steps(),
            },
            ToolCall::FinishPlan {} => {
                let steps = if plan.has_plan() {
                    plan.load_steps()?
                } else {
                    Vec::new()
                };
                if steps.is_empty() {
                    return Err(ResearchError::EmptyPlan.into());
                }
                self.phase = Phase::Research;
                info!(steps = steps.len(), "plan finished, research phase");
                ToolReply::PlanFinished {
                    steps: u32::try_from(steps.len()).unwrap_or(u32::MAX),
                }
            }
            ToolCall::NextStep { results } => ToolReply::Advanced {
                outcome: plan.advance(&results)?,
            },
            ToolCall::GetCurrentStep {} => ToolReply::CurrentStep {
                step: plan.get_current()?,
            },
            ToolCall::Search { query } => match self.collaborators.search(&query) {
                Ok(results) => ToolReply::SearchResults { results },
                Err(err) => failed("search", &err),
            },
            ToolCall::Crawl { url } => match self.collaborators.fetch_page(&url) {
                Ok(text) => ToolReply::Page { url, text },
                Err(err) => failed("crawl", &err),
            },
            ToolCall::LookupReference { title } => {
                match self.collaborators.lookup_reference(&title) {
                    Ok(text) => ToolReply::Reference { title, text },
                    Err(err) => failed("lookup_reference", &err),
                }
            }
            ToolCall::SaveKnowledge { knowledge } => ToolReply::KnowledgeSaved {
                ordinal: self.workspace.knowledge().save(&knowledge)?,
            },
            ToolCall::GetAllKnowledge {} => ToolReply::Knowledge {
                entries: self.workspace.knowledge().recall_all(),
            },
            ToolCall::WriteReport {
                title,
                body,
                sources,
            } => ToolReply::ReportWritten {
                path: self.workspace.write_report(&title, &body, &sources)?,
            },
        };
        Ok(reply)
    }

    fn check_phase(&self, call: &ToolCall) -> Result<(), ResearchError> {
        let name = call.name();
        if find_spec(name).is_some_and(|spec| spec.available_in(self.phase)) {
            return Ok(());
        }
        if matches!(call, ToolCall::CreateResearchPlanStep { .. }) {
            return Err(ResearchError::PlanFrozen);
        }
        Err(ResearchError::ToolUnavailable {
            tool: name.to_string(),
            phase: self.phase.to_string(),
        })
    }
}

fn failed(tool: &str, err: &anyhow::Error) -> ToolReply {
    warn!(tool, err = %format!("{err:#}"), "collaborator failed");
    ToolReply::Failed {
        tool: tool.to_string(),
        reason: format!("{err:#}"),
    }
}
