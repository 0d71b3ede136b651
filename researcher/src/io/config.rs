//! Researcher configuration stored in `researcher.toml` at the workspace root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::{DEFAULT_END_MARKER, DEFAULT_START_MARKER, Markers};

/// Researcher configuration (TOML).
///
/// Missing fields take their defaults, so an empty or absent file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResearcherConfig {
    /// Directory (relative to the workspace root) that receives final reports.
    pub reports_dir: String,

    pub markers: MarkerConfig,

    /// Web search command. Receives the query as its last argument and prints
    /// a JSON array of `{title, href, body}` objects.
    pub search: SearchConfig,

    /// Page crawl command. Receives the URL and prints page text.
    pub fetch: CommandConfig,

    /// Encyclopedia lookup command. Receives the title; empty output means
    /// not found.
    pub reference: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MarkerConfig {
    pub start: String,
    pub end: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_MARKER.to_string(),
            end: DEFAULT_END_MARKER.to_string(),
        }
    }
}

impl MarkerConfig {
    pub fn markers(&self) -> Result<Markers> {
        Markers::new(self.start.clone(), self.end.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Program and leading arguments. Empty means not configured.
    pub command: Vec<String>,

    pub timeout_secs: u64,

    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 120,
            output_limit_bytes: 200_000,
        }
    }
}

impl CommandConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("{section}.timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("{section}.output_limit_bytes must be > 0"));
        }
        if self.command.first().is_some_and(|p| p.trim().is_empty()) {
            return Err(anyhow!("{section}.command must start with a program name"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,

    /// Keep at most this many ranked results.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let base = CommandConfig::default();
        Self {
            command: base.command,
            timeout_secs: base.timeout_secs,
            output_limit_bytes: base.output_limit_bytes,
            max_results: 4,
        }
    }
}

impl SearchConfig {
    pub fn command_config(&self) -> CommandConfig {
        CommandConfig {
            command: self.command.clone(),
            timeout_secs: self.timeout_secs,
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

impl Default for ResearcherConfig {
    fn default() -> Self {
        Self {
            reports_dir: "final_reports".to_string(),
            markers: MarkerConfig::default(),
            search: SearchConfig::default(),
            fetch: CommandConfig::default(),
            reference: CommandConfig::default(),
        }
    }
}

impl ResearcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reports_dir.trim().is_empty() {
            return Err(anyhow!("reports_dir must not be empty"));
        }
        self.markers.markers().context("markers")?;
        self.search.command_config().validate("search")?;
        if self.search.max_results == 0 {
            return Err(anyhow!("search.max_results must be > 0"));
        }
        self.fetch.validate("fetch")?;
        self.reference.validate("reference")?;
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ResearcherConfig::default()`.
pub fn load_config(path: &Path) -> Result<ResearcherConfig> {
    if !path.exists() {
        let cfg = ResearcherConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ResearcherConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
