//! Workspace layout and session bootstrap.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::config::ResearcherConfig;

/// All canonical paths within a research workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub plans_dir: PathBuf,
    pub knowledge_dir: PathBuf,
    pub plan_path: PathBuf,
    pub progress_path: PathBuf,
    pub knowledge_path: PathBuf,
    pub config_path: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let plans_dir = root.join("research_plans");
        let knowledge_dir = root.join("research_knowledge");
        Self {
            root: root.clone(),
            plans_dir: plans_dir.clone(),
            knowledge_dir: knowledge_dir.clone(),
            plan_path: plans_dir.join("plan.json"),
            progress_path: plans_dir.join("state.json"),
            knowledge_path: knowledge_dir.join("knowledge.json"),
            config_path: root.join("researcher.toml"),
        }
    }

    pub fn reports_dir(&self, config: &ResearcherConfig) -> PathBuf {
        self.root.join(&config.reports_dir)
    }
}

/// Create the workspace directories and sweep temp files left behind by an
/// interrupted write.
pub fn prepare_layout(paths: &WorkspacePaths) -> Result<()> {
    for dir in [&paths.plans_dir, &paths.knowledge_dir] {
        create_dir(dir)?;
        remove_temp_files(dir)?;
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn remove_temp_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        let is_temp = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".json.tmp"));
        if is_temp && path.is_file() {
            debug!(path = %path.display(), "removing stale temp file");
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_stable() {
        let paths = WorkspacePaths::new("/work");
        assert!(paths.plan_path.ends_with("research_plans/plan.json"));
        assert!(paths.progress_path.ends_with("research_plans/state.json"));
        assert!(
            paths
                .knowledge_path
                .ends_with("research_knowledge/knowledge.json")
        );
        assert!(paths.config_path.ends_with("researcher.toml"));
        assert_eq!(
            paths.reports_dir(&ResearcherConfig::default()),
            PathBuf::from("/work/final_reports")
        );
    }

    #[test]
    fn prepare_creates_dirs_and_sweeps_temp_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WorkspacePaths::new(temp.path());
        prepare_layout(&paths).expect("prepare");
        assert!(paths.plans_dir.is_dir());
        assert!(paths.knowledge_dir.is_dir());

        let stale = paths.plans_dir.join("plan.json.tmp");
        fs::write(&stale, "{").expect("write");
        fs::write(&paths.plan_path, "{}").expect("write");
        prepare_layout(&paths).expect("prepare again");
        assert!(!stale.exists());
        assert!(paths.plan_path.exists());
    }
}
