//! Closed tool interface exposed to the orchestration runtime.
//!
//! The runtime names an operation and passes JSON arguments. Every known
//! operation appears in the contract table returned by [`tool_specs`];
//! incoming arguments are checked against the table's JSON schema before they
//! are decoded into a [`ToolCall`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::types::{AdvanceOutcome, Next, SearchHit, Step};

/// Which half of a research session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Research,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planning => "planning",
            Self::Research => "research",
        })
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "research" => Ok(Self::Research),
            other => Err(format!("unknown phase {other:?} (expected planning or research)")),
        }
    }
}

/// One operation the model may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    AskQuestion { question: String },
    CreateResearchPlanStep { step: String },
    GetAllSteps {},
    FinishPlan {},
    NextStep { results: String },
    GetCurrentStep {},
    Search { query: String },
    Crawl { url: String },
    LookupReference { title: String },
    SaveKnowledge { knowledge: String },
    GetAllKnowledge {},
    WriteReport {
        title: String,
        body: String,
        #[serde(default)]
        sources: Vec<String>,
    },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AskQuestion { .. } => "ask_question",
            Self::CreateResearchPlanStep { .. } => "create_research_plan_step",
            Self::GetAllSteps {} => "get_all_steps",
            Self::FinishPlan {} => "finish_plan",
            Self::NextStep { .. } => "next_step",
            Self::GetCurrentStep {} => "get_current_step",
            Self::Search { .. } => "search",
            Self::Crawl { .. } => "crawl",
            Self::LookupReference { .. } => "lookup_reference",
            Self::SaveKnowledge { .. } => "save_knowledge",
            Self::GetAllKnowledge {} => "get_all_knowledge",
            Self::WriteReport { .. } => "write_report",
        }
    }

    /// Decode `{"name": ..., "arguments": ...}` after checking the arguments
    /// against the tool's schema. `arguments` may be an object, a JSON string
    /// holding an object, or absent.
    pub fn from_json(raw: &Value) -> Result<Self> {
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .context("tool call is missing a string \"name\"")?;
        let spec = find_spec(name).ok_or_else(|| anyhow!("unknown tool {name:?}"))?;

        let arguments = match raw.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .with_context(|| format!("parse arguments of {name}"))?,
            Some(other) => other.clone(),
        };

        let validator = jsonschema::validator_for(&spec.parameters)
            .map_err(|err| anyhow!("compile argument schema for {name}: {err}"))?;
        let problems: Vec<String> = validator
            .iter_errors(&arguments)
            .map(|err| err.to_string())
            .collect();
        if !problems.is_empty() {
            bail!("invalid arguments for {name}: {}", problems.join("; "));
        }

        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .with_context(|| format!("decode arguments of {name}"))
    }
}

/// Contract entry for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments object.
    pub parameters: Value,
    #[serde(skip)]
    pub phases: &'static [Phase],
}

impl ToolSpec {
    pub fn available_in(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

const PLANNING: &[Phase] = &[Phase::Planning];
const RESEARCH: &[Phase] = &[Phase::Research];
const BOTH: &[Phase] = &[Phase::Planning, Phase::Research];

static CONTRACT: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec {
            name: "ask_question",
            description: "Ask the user a clarifying question about the research topic.",
            parameters: string_args(&[("question", "The question to ask.")]),
            phases: PLANNING,
        },
        ToolSpec {
            name: "create_research_plan_step",
            description: "Append one step to the research plan.",
            parameters: string_args(&[("step", "What this step should investigate.")]),
            phases: PLANNING,
        },
        ToolSpec {
            name: "get_all_steps",
            description: "List every step of the research plan in order.",
            parameters: string_args(&[]),
            phases: BOTH,
        },
        ToolSpec {
            name: "finish_plan",
            description: "Finalize the research plan and start researching.",
            parameters: string_args(&[]),
            phases: PLANNING,
        },
        ToolSpec {
            name: "next_step",
            description: "Report results for the current step and move to the next one.",
            parameters: string_args(&[("results", "Findings for the current step.")]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "get_current_step",
            description: "Show the step currently being researched.",
            parameters: string_args(&[]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "search",
            description: "Search the web.",
            parameters: string_args(&[("query", "Search query.")]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "crawl",
            description: "Fetch the text content of a web page.",
            parameters: string_args(&[("url", "An http:// or https:// URL.")]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "lookup_reference",
            description: "Look up an encyclopedia article by title.",
            parameters: string_args(&[("title", "Article title.")]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "save_knowledge",
            description: "Save one fact to the knowledge base.",
            parameters: string_args(&[("knowledge", "The fact to remember.")]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "get_all_knowledge",
            description: "Recall every saved fact in save order.",
            parameters: string_args(&[]),
            phases: RESEARCH,
        },
        ToolSpec {
            name: "write_report",
            description: "Write the final report. Only allowed once every step is done.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Report title." },
                    "body": { "type": "string", "description": "Markdown body." },
                    "sources": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Source URLs or citations."
                    }
                },
                "required": ["title", "body"],
                "additionalProperties": false
            }),
            phases: RESEARCH,
        },
    ]
});

fn string_args(fields: &[(&str, &str)]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, description)| {
            (
                (*name).to_string(),
                json!({ "type": "string", "description": description }),
            )
        })
        .collect();
    let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Every tool, whatever the phase.
pub fn all_tool_specs() -> &'static [ToolSpec] {
    &CONTRACT
}

/// Tools available during `phase`, in contract order.
pub fn tool_specs(phase: Phase) -> Vec<&'static ToolSpec> {
    CONTRACT.iter().filter(|spec| spec.available_in(phase)).collect()
}

pub fn find_spec(name: &str) -> Option<&'static ToolSpec> {
    CONTRACT.iter().find(|spec| spec.name == name)
}

/// What a dispatched tool call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolReply {
    Answer { text: String },
    StepCreated { step: Step },
    Steps { steps: Vec<Step> },
    CurrentStep { step: Option<Step> },
    PlanFinished { steps: u32 },
    Advanced { outcome: AdvanceOutcome },
    SearchResults { results: Vec<SearchHit> },
    Page { url: String, text: String },
    Reference { title: String, text: Option<String> },
    KnowledgeSaved { ordinal: u32 },
    Knowledge { entries: Vec<String> },
    ReportWritten { path: PathBuf },
    /// The request was rejected; the session can continue.
    Refused { reason: String },
    /// An external collaborator failed.
    Failed { tool: String, reason: String },
}

pub const NO_ANSWER: &str = "No answer provided. Make an assumption.";

impl ToolReply {
    /// Text handed back to the model.
    pub fn message(&self) -> String {
        match self {
            Self::Answer { text } => text.clone(),
            Self::StepCreated { step } => format!("Step {} created successfully.", step.ordinal),
            Self::Steps { steps } if steps.is_empty() => "No steps in the research plan.".to_string(),
            Self::Steps { steps } => lines(steps.iter().map(Step::to_string)),
            Self::CurrentStep { step: Some(step) } => step.to_string(),
            Self::CurrentStep { step: None } => "No current step set.".to_string(),
            Self::PlanFinished { steps } => {
                format!("Research plan finalized with {steps} steps. Starting research.")
            }
            Self::Advanced { outcome } => match &outcome.next {
                Next::Step(step) => step.to_string(),
                Next::Complete => "Research plan complete.".to_string(),
            },
            Self::SearchResults { results } if results.is_empty() => {
                "No results found.".to_string()
            }
            Self::SearchResults { results } => results
                .iter()
                .map(|hit| format!("{}\n{}\n{}", hit.title, hit.url, hit.snippet))
                .collect::<Vec<_>>()
                .join("\n\n"),
            Self::Page { text, .. } => text.clone(),
            Self::Reference { text: Some(text), .. } => text.clone(),
            Self::Reference { title, text: None } => {
                format!("No reference article found for {title:?}.")
            }
            Self::KnowledgeSaved { ordinal } => {
                format!("Knowledge {ordinal} saved successfully.")
            }
            Self::Knowledge { entries } if entries.is_empty() => "No knowledge saved yet.".to_string(),
            Self::Knowledge { entries } => lines(entries.iter().cloned()),
            Self::ReportWritten { path } => format!("Report written to {}", path.display()),
            Self::Refused { reason } => reason.clone(),
            Self::Failed { tool, reason } => format!("{tool} failed: {reason}"),
        }
    }

    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }
}

fn lines(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join("\n")
}
