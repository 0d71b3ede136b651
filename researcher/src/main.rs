//! Autonomous research workflow CLI.
//!
//! Manages the research plan (`research_plans/`), the knowledge base
//! (`research_knowledge/`) and the final report gate, and serves tool calls
//! from an orchestrating model one JSON request at a time.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use researcher::core::classifier::StreamClassifier;
use researcher::core::types::{Span, SpanMode};
use researcher::error::ResearchError;
use researcher::exit_codes;
use researcher::io::collaborators::CommandCollaborators;
use researcher::session::Session;
use researcher::tools::{Phase, ToolReply, all_tool_specs, tool_specs};
use researcher::workspace::Workspace;

#[derive(Parser)]
#[command(
    name = "researcher",
    version,
    about = "Durable plan, knowledge and report state for an autonomous research agent"
)]
struct Cli {
    /// Workspace root holding `research_plans/`, `research_knowledge/` and reports.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discard plan, progress and knowledge and recreate the directories.
    Reset,
    /// Inspect or change the research plan.
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Save or recall research knowledge.
    #[command(subcommand)]
    Knowledge(KnowledgeCommand),
    /// Write the final report once every step has been reached.
    Report(ReportArgs),
    /// Print the tool contract table as JSON.
    Tools {
        /// Only tools available in this phase.
        #[arg(long)]
        phase: Option<Phase>,
    },
    /// Read one JSON tool call from stdin and print the JSON reply.
    Call {
        #[arg(long, default_value = "planning")]
        phase: Phase,
    },
    /// Split streamed model output on stdin into visible (stdout) and internal (stderr) text.
    Classify {
        /// Drop internal text instead of writing it to stderr.
        #[arg(long)]
        hide_internal: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Append a step.
    Add { step: String },
    /// List every step.
    List,
    /// Show the active step.
    Current,
    /// Report results for the active step and move on. Exits 2 once complete.
    Advance {
        #[arg(long, default_value = "")]
        result: String,
    },
}

#[derive(Subcommand)]
enum KnowledgeCommand {
    Save { text: String },
    List,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    title: String,
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    body: Option<String>,
    #[arg(long)]
    body_file: Option<PathBuf>,
    /// Source URL or citation; repeatable.
    #[arg(long = "source")]
    sources: Vec<String>,
}

#[derive(Serialize)]
struct CallOutput<'a> {
    phase: Phase,
    message: String,
    reply: &'a ToolReply,
}

fn main() {
    researcher::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            match err.downcast_ref::<ResearchError>() {
                Some(ResearchError::ReportIncomplete { .. }) => exit_codes::INCOMPLETE,
                _ => exit_codes::INVALID,
            }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Reset => cmd_reset(&cli.root),
        Command::Plan(command) => cmd_plan(&cli.root, command),
        Command::Knowledge(command) => cmd_knowledge(&cli.root, command),
        Command::Report(args) => cmd_report(&cli.root, args),
        Command::Tools { phase } => cmd_tools(phase),
        Command::Call { phase } => cmd_call(&cli.root, phase),
        Command::Classify { hide_internal } => cmd_classify(&cli.root, hide_internal),
    }
}

fn cmd_reset(root: &Path) -> Result<i32> {
    Workspace::open(root)?.reset()?;
    Ok(exit_codes::OK)
}

fn cmd_plan(root: &Path, command: PlanCommand) -> Result<i32> {
    let workspace = Workspace::open(root)?;
    let plan = workspace.plan();
    let reply = match command {
        PlanCommand::Add { step } => ToolReply::StepCreated {
            step: plan.add_step(&step)?,
        },
        PlanCommand::List => ToolReply::Steps {
            steps: plan.list_steps(),
        },
        PlanCommand::Current => ToolReply::CurrentStep {
            step: plan.get_current()?,
        },
        PlanCommand::Advance { result } => {
            let outcome = plan.advance(&result)?;
            let code = if outcome.is_complete() {
                exit_codes::COMPLETE
            } else {
                exit_codes::OK
            };
            println!("{}", ToolReply::Advanced { outcome }.message());
            return Ok(code);
        }
    };
    println!("{}", reply.message());
    Ok(exit_codes::OK)
}

fn cmd_knowledge(root: &Path, command: KnowledgeCommand) -> Result<i32> {
    let workspace = Workspace::open(root)?;
    let reply = match command {
        KnowledgeCommand::Save { text } => ToolReply::KnowledgeSaved {
            ordinal: workspace.knowledge().save(&text)?,
        },
        KnowledgeCommand::List => ToolReply::Knowledge {
            entries: workspace.knowledge().recall_all(),
        },
    };
    println!("{}", reply.message());
    Ok(exit_codes::OK)
}

fn cmd_report(root: &Path, args: ReportArgs) -> Result<i32> {
    let workspace = Workspace::open(root)?;
    let body = match (args.body, args.body_file) {
        (Some(body), _) => body,
        (None, Some(path)) => {
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?
        }
        (None, None) => String::new(),
    };
    let path = workspace.write_report(&args.title, &body, &args.sources)?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_tools(phase: Option<Phase>) -> Result<i32> {
    let specs = match phase {
        Some(phase) => tool_specs(phase),
        None => all_tool_specs().iter().collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&specs).context("serialize tool specs")?
    );
    Ok(exit_codes::OK)
}

fn cmd_call(root: &Path, phase: Phase) -> Result<i32> {
    let workspace = Workspace::open(root)?;
    let collaborators = CommandCollaborators::from_config(workspace.config());
    let raw = read_tool_call(&mut std::io::stdin().lock())?;

    let mut session = Session::new(&workspace, &collaborators, phase);
    let reply = session.dispatch_json(&raw)?;
    let output = CallOutput {
        phase: session.phase(),
        message: reply.message(),
        reply: &reply,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("serialize tool reply")?
    );
    Ok(exit_codes::OK)
}

/// Decode exactly one JSON value and the rest of its line, leaving later
/// lines for `ask_question` answers.
fn read_tool_call<R: BufRead>(input: &mut R) -> Result<Value> {
    let raw = serde_json::Deserializer::from_reader(&mut *input)
        .into_iter::<Value>()
        .next()
        .context("no tool call on stdin")?
        .context("parse tool call json")?;
    let mut rest = String::new();
    input.read_line(&mut rest).context("read stdin")?;
    if !rest.trim().is_empty() {
        bail!("unexpected input after tool call: {:?}", rest.trim());
    }
    Ok(raw)
}

fn cmd_classify(root: &Path, hide_internal: bool) -> Result<i32> {
    let workspace = Workspace::open(root)?;
    let mut classifier = StreamClassifier::new(workspace.markers()?);
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        line.clear();
        let read = input.read_line(&mut line).context("read stdin")?;
        if read == 0 {
            break;
        }
        emit(&classifier.push(&line), hide_internal)?;
    }
    emit(&classifier.finish(), hide_internal)?;
    Ok(exit_codes::OK)
}

fn emit(spans: &[Span], hide_internal: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr().lock();
    for span in spans {
        let written = match span.mode {
            SpanMode::Visible => stdout.write_all(span.text.as_bytes()),
            SpanMode::Internal if hide_internal => Ok(()),
            SpanMode::Internal => stderr.write_all(span.text.as_bytes()),
        };
        written.context("write classified output")?;
    }
    stdout.flush().context("flush stdout")?;
    stderr.flush().context("flush stderr")?;
    Ok(())
}
