//! A research workspace: config, plan, knowledge and the report gate wired
//! to their files under one root directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::classifier::Markers;
use crate::error::ResearchError;
use crate::gate::ReportGate;
use crate::io::config::{ResearcherConfig, load_config};
use crate::io::init::{WorkspacePaths, prepare_layout};
use crate::io::keyed_log::JsonFileLog;
use crate::io::progress_store::ProgressStore;
use crate::knowledge::KnowledgeStore;
use crate::plan::PlanTracker;

#[derive(Debug)]
pub struct Workspace {
    paths: WorkspacePaths,
    config: ResearcherConfig,
    plan: PlanTracker<JsonFileLog>,
    knowledge: KnowledgeStore<JsonFileLog>,
    gate: ReportGate,
}

impl Workspace {
    /// Open the workspace at `root`, reading `researcher.toml` if present.
    pub fn open(root: &Path) -> Result<Self> {
        let paths = WorkspacePaths::new(root);
        let config = load_config(&paths.config_path)?;
        Ok(Self::with_config(paths, config))
    }

    pub fn with_config(paths: WorkspacePaths, config: ResearcherConfig) -> Self {
        let plan = PlanTracker::new(
            JsonFileLog::new(&paths.plan_path),
            ProgressStore::new(&paths.progress_path),
        );
        let knowledge = KnowledgeStore::new(JsonFileLog::new(&paths.knowledge_path));
        let gate = ReportGate::new(paths.reports_dir(&config));
        Self {
            paths,
            config,
            plan,
            knowledge,
            gate,
        }
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn config(&self) -> &ResearcherConfig {
        &self.config
    }

    pub fn plan(&self) -> &PlanTracker<JsonFileLog> {
        &self.plan
    }

    pub fn knowledge(&self) -> &KnowledgeStore<JsonFileLog> {
        &self.knowledge
    }

    pub fn markers(&self) -> Result<Markers> {
        self.config.markers.markers()
    }

    /// Write the final report through the completion gate.
    pub fn write_report(
        &self,
        title: &str,
        body: &str,
        sources: &[String],
    ) -> Result<PathBuf, ResearchError> {
        self.gate
            .authorize_and_render(&self.plan, title, body, sources)
    }

    /// Start a fresh session: drop plan, progress and knowledge, then recreate
    /// the directories. Earlier reports are kept.
    #[instrument(skip_all, fields(root = %self.paths.root.display()))]
    pub fn reset(&self) -> Result<()> {
        self.plan.reset().context("reset research plan")?;
        self.knowledge.clear().context("reset knowledge")?;
        prepare_layout(&self.paths)?;
        info!("workspace reset");
        Ok(())
    }
}
