//! Completion gate in front of the final report.
//!
//! A report is only written once every planned step has been reached. The
//! gate re-reads plan length and progress from disk on each call so stale
//! in-memory counts cannot unlock it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, instrument, warn};

use crate::core::title::sanitize_title;
use crate::error::ResearchError;
use crate::io::keyed_log::KeyedLog;
use crate::io::report::{render_report, report_file_name, write_report};
use crate::plan::PlanTracker;

#[derive(Debug, Clone)]
pub struct ReportGate {
    reports_dir: PathBuf,
}

impl ReportGate {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Write the final report if research is complete.
    pub fn authorize_and_render<L: KeyedLog>(
        &self,
        plan: &PlanTracker<L>,
        title: &str,
        body: &str,
        sources: &[String],
    ) -> Result<PathBuf, ResearchError> {
        self.authorize_and_render_at(plan, title, body, sources, Local::now())
    }

    /// As [`Self::authorize_and_render`], stamping the file name with `at`.
    #[instrument(skip_all, fields(title = %title))]
    pub fn authorize_and_render_at<L: KeyedLog>(
        &self,
        plan: &PlanTracker<L>,
        title: &str,
        body: &str,
        sources: &[String],
        at: DateTime<Local>,
    ) -> Result<PathBuf, ResearchError> {
        let progress = plan.counts()?;
        if !progress.is_complete() {
            warn!(
                current = progress.current(),
                total = progress.total(),
                "report refused, research incomplete"
            );
            return Err(ResearchError::ReportIncomplete {
                current: progress.current(),
                total: progress.total(),
            });
        }

        let sanitized = sanitize_title(title).ok_or_else(|| ResearchError::InvalidTitle {
            title: title.to_string(),
        })?;
        let document = render_report(title, body, sources).map_err(|err| {
            ResearchError::io("render report", std::io::Error::other(err.to_string()))
        })?;
        let path = write_report(
            &self.reports_dir,
            &report_file_name(&sanitized, at),
            &document,
        )?;
        info!(path = %path.display(), "final report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::keyed_log::JsonFileLog;
    use crate::io::progress_store::{ProgressState, ProgressStore};
    use chrono::TimeZone;
    use std::fs;

    struct Fixture {
        _temp: tempfile::TempDir,
        plan: PlanTracker<JsonFileLog>,
        progress: ProgressStore,
        gate: ReportGate,
    }

    fn fixture(steps: &[&str]) -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let progress = ProgressStore::new(temp.path().join("state.json"));
        let plan = PlanTracker::new(
            JsonFileLog::new(temp.path().join("plan.json")),
            progress.clone(),
        );
        for step in steps {
            plan.add_step(step).expect("add step");
        }
        let gate = ReportGate::new(temp.path().join("final_reports"));
        Fixture {
            _temp: temp,
            plan,
            progress,
            gate,
        }
    }

    fn at() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 1, 2, 3, 4, 5)
            .single()
            .expect("unambiguous time")
    }

    #[test]
    fn refuses_until_every_step_reached() {
        let fx = fixture(&["a", "b", "c"]);
        fx.plan.advance("").expect("advance");
        fx.plan.advance("").expect("advance");

        let err = fx
            .gate
            .authorize_and_render_at(&fx.plan, "Report", "body", &[], at())
            .unwrap_err();
        assert_eq!(err.to_string(), "research incomplete: current=2, N=3");
        assert!(!fx.gate.reports_dir().exists());
    }

    #[test]
    fn writes_report_once_complete() {
        let fx = fixture(&["a", "b"]);
        fx.plan.advance("").expect("advance");
        fx.plan.advance("").expect("advance");

        let path = fx
            .gate
            .authorize_and_render_at(
                &fx.plan,
                "A/B: Report?",
                "Findings.",
                &["https://example.com".to_string()],
                at(),
            )
            .expect("report");
        assert_eq!(
            path,
            fx.gate.reports_dir().join("AB_Report_20250102_030405.md")
        );
        let doc = fs::read_to_string(&path).expect("read");
        assert!(doc.starts_with("# A/B: Report?\n\nFindings.\n"));
        assert!(doc.contains("- https://example.com"));
    }

    #[test]
    fn rereads_progress_from_disk() {
        let fx = fixture(&["a"]);
        fx.progress
            .write(ProgressState { current_step: 1 })
            .expect("write progress");
        fx.gate
            .authorize_and_render_at(&fx.plan, "Done", "body", &[], at())
            .expect("report");

        fx.progress
            .write(ProgressState { current_step: 0 })
            .expect("rewind progress");
        let err = fx
            .gate
            .authorize_and_render_at(&fx.plan, "Done", "body", &[], at())
            .unwrap_err();
        assert!(matches!(err, ResearchError::ReportIncomplete { current: 0, total: 1 }));
    }

    #[test]
    fn rejects_title_without_safe_characters() {
        let fx = fixture(&["a"]);
        fx.plan.advance("").expect("advance");
        let err = fx
            .gate
            .authorize_and_render_at(&fx.plan, "?!/", "body", &[], at())
            .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidTitle { .. }));
    }

    #[test]
    fn missing_plan_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plan = PlanTracker::new(
            JsonFileLog::new(temp.path().join("plan.json")),
            ProgressStore::new(temp.path().join("state.json")),
        );
        let gate = ReportGate::new(temp.path().join("final_reports"));
        let err = gate
            .authorize_and_render_at(&plan, "T", "B", &[], at())
            .unwrap_err();
        assert!(matches!(err, ResearchError::MissingOrCorruptPlan { .. }));
        assert!(!err.is_recoverable());
    }
}
