//! Final report rendering and persistence.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use minijinja::{Environment, context};
use tracing::{debug, instrument};

use crate::error::ResearchError;

const REPORT_TEMPLATE: &str = include_str!("templates/report.md");

/// Timestamp suffix with second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Render the report document: title heading, body, then one source per line.
///
/// Whitespace runs inside a source, line breaks included, collapse to a single
/// space. Sources that are blank after that are dropped.
pub fn render_report(title: &str, body: &str, sources: &[String]) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE)?;
    let template = env.get_template("report")?;
    let sources: Vec<String> = sources
        .iter()
        .map(|source| source.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|source| !source.is_empty())
        .collect();
    let mut rendered = template.render(context! {
        title => title.trim(),
        body => body.trim(),
        sources => sources,
    })?;
    rendered.push('\n');
    Ok(rendered)
}

/// `<sanitized title>_<YYYYMMDD_HHMMSS>.md`
pub fn report_file_name(sanitized_title: &str, at: DateTime<Local>) -> String {
    format!("{sanitized_title}_{}.md", at.format(TIMESTAMP_FORMAT))
}

/// Write a rendered report into `dir`, replacing any file with the same name.
#[instrument(skip_all, fields(dir = %dir.display(), file_name = %file_name))]
pub fn write_report(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf, ResearchError> {
    fs::create_dir_all(dir)
        .map_err(|err| ResearchError::io(format!("create directory {}", dir.display()), err))?;
    let path = dir.join(file_name);
    let tmp_path = dir.join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, contents)
        .map_err(|err| ResearchError::io(format!("write {}", tmp_path.display()), err))?;
    fs::rename(&tmp_path, &path)
        .map_err(|err| ResearchError::io(format!("replace {}", path.display()), err))?;
    debug!(path = %path.display(), bytes = contents.len(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_heading_body_and_sources_in_order() {
        let doc = render_report(
            "Solar Storage",
            "Batteries are getting cheaper.\n",
            &[
                "https://b.example/second".to_string(),
                "https://a.example/first".to_string(),
            ],
        )
        .expect("render");
        assert!(doc.starts_with("# Solar Storage\n\nBatteries are getting cheaper.\n\n## Sources\n"));
        assert!(doc.ends_with("- https://b.example/second\n- https://a.example/first\n"));
    }

    #[test]
    fn multi_line_sources_stay_on_one_line() {
        let doc = render_report(
            "T",
            "B",
            &[
                "Smith, J.\n  Energy Review".to_string(),
                " \n\t".to_string(),
                "https://c.example".to_string(),
            ],
        )
        .expect("render");
        assert!(doc.ends_with("## Sources\n\n- Smith, J. Energy Review\n- https://c.example\n"));
    }

    #[test]
    fn renders_placeholder_without_sources() {
        let doc = render_report("T", "B", &[]).expect("render");
        assert!(doc.contains("## Sources\n\n_No sources listed._\n"));
    }

    #[test]
    fn file_name_uses_second_resolution_timestamp() {
        let at = Local
            .with_ymd_and_hms(2025, 3, 7, 9, 5, 2)
            .single()
            .expect("unambiguous time");
        assert_eq!(report_file_name("AB_Report", at), "AB_Report_20250307_090502.md");
    }

    #[test]
    fn write_report_creates_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("final_reports");
        let path = write_report(&dir, "x.md", "# x\n").expect("write");
        assert_eq!(path, dir.join("x.md"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "# x\n");
        let leftovers: Vec<_> = fs::read_dir(&dir).expect("read dir").collect();
        assert_eq!(leftovers.len(), 1);
    }
}
