//! Boundary to the external integrations the research loop consumes.
//!
//! The [`Collaborators`] trait keeps web search, page crawling, reference
//! lookup and user prompting out of the core. [`CommandCollaborators`]
//! delegates each call to a configured external command; tests use scripted
//! implementations that never spawn processes.

use std::io::{BufRead, Write};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::types::SearchHit;
use crate::io::config::{CommandConfig, ResearcherConfig};
use crate::io::process::run_command_with_timeout;

/// External calls available to the research loop. Each call blocks until it
/// has a result.
pub trait Collaborators {
    /// Ranked web search results for `query`.
    fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    /// Text content of the page at `url`.
    fn fetch_page(&self, url: &str) -> Result<String>;

    /// Encyclopedia article text for `title`, or `None` when there is none.
    fn lookup_reference(&self, title: &str) -> Result<Option<String>>;

    /// Ask the human a question; `None` means no answer was given.
    fn ask_user(&self, prompt: &str) -> Result<Option<String>>;
}

/// Collaborators backed by external commands from `researcher.toml`.
#[derive(Debug, Clone)]
pub struct CommandCollaborators {
    search: CommandConfig,
    max_results: usize,
    fetch: CommandConfig,
    reference: CommandConfig,
}

impl CommandCollaborators {
    pub fn from_config(config: &ResearcherConfig) -> Self {
        Self {
            search: config.search.command_config(),
            max_results: config.search.max_results,
            fetch: config.fetch.clone(),
            reference: config.reference.clone(),
        }
    }
}

impl Collaborators for CommandCollaborators {
    #[instrument(skip(self))]
    fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        info!("searching");
        let stdout = run_configured(&self.search, "search", query)?;
        parse_search_hits(&stdout, self.max_results)
    }

    #[instrument(skip(self))]
    fn fetch_page(&self, url: &str) -> Result<String> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("url must start with http:// or https:// (got {url:?})"));
        }
        info!("crawling");
        run_configured(&self.fetch, "fetch", url)
    }

    #[instrument(skip(self))]
    fn lookup_reference(&self, title: &str) -> Result<Option<String>> {
        let stdout = run_configured(&self.reference, "reference lookup", title)?;
        let text = stdout.trim();
        if text.is_empty() {
            debug!("reference not found");
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }

    /// Prompts on stderr so stdout stays free for command output.
    fn ask_user(&self, prompt: &str) -> Result<Option<String>> {
        let stdin = std::io::stdin();
        let stderr = std::io::stderr();
        ask_on(&mut stdin.lock(), &mut stderr.lock(), prompt)
    }
}

fn run_configured(config: &CommandConfig, label: &str, arg: &str) -> Result<String> {
    let (program, args) = config
        .command
        .split_first()
        .ok_or_else(|| anyhow!("{label} command not configured"))?;
    let mut cmd = Command::new(program);
    cmd.args(args).arg(arg);
    let timeout = Duration::from_secs(config.timeout_secs);
    let output = run_command_with_timeout(cmd, timeout, config.output_limit_bytes)
        .with_context(|| format!("run {label} command {program}"))?;
    output.ensure_success(label, timeout)?;
    Ok(output.stdout_text())
}

/// Parse a JSON array of search results, keeping at most `max_results`.
pub fn parse_search_hits(stdout: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut hits: Vec<SearchHit> =
        serde_json::from_str(trimmed).context("parse search results")?;
    hits.truncate(max_results);
    Ok(hits)
}

fn ask_on<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
    writeln!(output, "{prompt}").context("write prompt")?;
    write!(output, "Your answer: ").context("write prompt")?;
    output.flush().context("flush prompt")?;
    let mut line = String::new();
    input.read_line(&mut line).context("read answer")?;
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}
