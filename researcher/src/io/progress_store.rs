//! Progress state storage (`research_plans/state.json`).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResearchError;

/// Persisted position of the plan state machine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressState {
    /// Ordinal of the active step; `0` before the first advance.
    pub current_step: u32,
}

/// Sole owner of the progress file.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load progress. A missing file is the initial state.
    pub fn load(&self) -> Result<ProgressState, ResearchError> {
        debug!(path = %self.path.display(), "loading progress");
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ProgressState::default()),
            Err(err) => {
                return Err(ResearchError::io(
                    format!("read progress {}", self.path.display()),
                    err,
                ));
            }
        };
        let state: ProgressState =
            serde_json::from_str(&contents).map_err(|err| ResearchError::CorruptProgress {
                path: self.path.clone(),
                reason: err.to_string(),
            })?;
        debug!(current_step = state.current_step, "progress loaded");
        Ok(state)
    }

    /// Atomically write progress to disk (temp file + rename).
    pub fn write(&self, state: ProgressState) -> Result<(), ResearchError> {
        debug!(path = %self.path.display(), current_step = state.current_step, "writing progress");
        let mut buf = serde_json::to_string_pretty(&state).map_err(|err| {
            ResearchError::io(format!("serialize {}", self.path.display()), err.into())
        })?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    pub fn clear(&self) -> Result<(), ResearchError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ResearchError::io(
                format!("remove {}", self.path.display()),
                err,
            )),
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ResearchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            ResearchError::io(format!("create directory {}", parent.display()), err)
        })?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(|err| {
        ResearchError::io(format!("write temp progress {}", tmp_path.display()), err)
    })?;
    fs::rename(&tmp_path, path)
        .map_err(|err| ResearchError::io(format!("replace progress {}", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_started() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ProgressStore::new(temp.path().join("state.json"));
        assert_eq!(store.load().expect("load"), ProgressState { current_step: 0 });
    }

    /// Guards the on-disk format against accidental field renames.
    #[test]
    fn progress_format_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ProgressStore::new(temp.path().join("research_plans/state.json"));

        store.write(ProgressState { current_step: 3 }).expect("write");
        let contents = fs::read_to_string(store.path()).expect("read");
        assert_eq!(contents, "{\n  \"current_step\": 3\n}\n");
        assert_eq!(store.load().expect("load").current_step, 3);
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        fs::write(&path, "{\"current_step\": -1}").expect("write");
        let err = ProgressStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ResearchError::CorruptProgress { .. }));
    }
}
