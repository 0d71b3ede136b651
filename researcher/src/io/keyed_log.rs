//! Durable append-only log keyed by dense 1-based ordinals.
//!
//! The file backend stores the whole collection as one JSON object
//! (`{"1": "...", "2": "..."}`) and rewrites it on every append. Callers only
//! see the [`KeyedLog`] trait, so another store can replace it.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

const KEYED_LOG_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/keyed_log.schema.json"
));

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(KEYED_LOG_SCHEMA).expect("keyed log schema should be valid json");
    jsonschema::validator_for(&schema).expect("keyed log schema should compile")
});

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ordinal: u32,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("{0} does not exist")]
    Missing(PathBuf),
    #[error("{path} is not a valid keyed log: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Append-with-sequential-key store.
pub trait KeyedLog {
    /// Assign the next ordinal to `value` and persist before returning.
    fn append(&self, value: &str) -> Result<u32, LogError>;

    /// All entries in ordinal order. Fails if the store is missing or corrupt.
    fn entries(&self) -> Result<Vec<Entry>, LogError>;

    fn exists(&self) -> bool;

    /// Drop every entry.
    fn clear(&self) -> Result<(), LogError>;

    /// Values in ordinal order; a missing or unreadable store reads as empty.
    fn list_all(&self) -> Vec<String> {
        match self.entries() {
            Ok(entries) => entries.into_iter().map(|e| e.value).collect(),
            Err(err) => {
                debug!(err = %err, "listing keyed log as empty");
                Vec::new()
            }
        }
    }
}

/// JSON-file backed [`KeyedLog`].
#[derive(Debug)]
pub struct JsonFileLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<u32, String>, LogError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LogError::Missing(self.path.clone()));
            }
            Err(source) => {
                return Err(LogError::Io {
                    context: format!("read {}", self.path.display()),
                    source,
                });
            }
        };
        parse_log(&contents).map_err(|reason| LogError::Corrupt {
            path: self.path.clone(),
            reason,
        })
    }

    fn store(&self, entries: &BTreeMap<u32, String>) -> Result<(), LogError> {
        let mut buf =
            serde_json::to_string_pretty(&OrdinalMap(entries)).map_err(|err| LogError::Io {
                context: format!("serialize {}", self.path.display()),
                source: err.into(),
            })?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

impl KeyedLog for JsonFileLog {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn append(&self, value: &str) -> Result<u32, LogError> {
        // Held for the whole read-modify-write so two appends never share a key.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(LogError::Missing(_)) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        let ordinal = match entries.last_key_value() {
            None => 1,
            Some((last, _)) => last.checked_add(1).ok_or_else(|| LogError::Corrupt {
                path: self.path.clone(),
                reason: "ordinal space exhausted".to_string(),
            })?,
        };
        entries.insert(ordinal, value.to_string());
        self.store(&entries)?;
        debug!(ordinal, "appended entry");
        Ok(ordinal)
    }

    fn entries(&self) -> Result<Vec<Entry>, LogError> {
        let entries = self.load()?;
        Ok(entries
            .into_iter()
            .map(|(ordinal, value)| Entry { ordinal, value })
            .collect())
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn clear(&self) -> Result<(), LogError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LogError::Io {
                context: format!("remove {}", self.path.display()),
                source,
            }),
        }
    }
}

/// Serializes entries as a JSON object in numeric key order.
struct OrdinalMap<'a>(&'a BTreeMap<u32, String>);

impl Serialize for OrdinalMap<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

fn parse_log(contents: &str) -> Result<BTreeMap<u32, String>, String> {
    let value: Value = serde_json::from_str(contents).map_err(|err| err.to_string())?;
    let messages: Vec<String> = SCHEMA.iter_errors(&value).map(|e| e.to_string()).collect();
    if !messages.is_empty() {
        return Err(messages.join("; "));
    }
    let Value::Object(map) = value else {
        return Err("expected a json object".to_string());
    };
    let mut entries = BTreeMap::new();
    for (key, value) in map {
        let ordinal: u32 = key
            .parse()
            .map_err(|_| format!("ordinal {key:?} out of range"))?;
        let Value::String(text) = value else {
            return Err(format!("entry {key} is not a string"));
        };
        entries.insert(ordinal, text);
    }
    Ok(entries)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), LogError> {
    let io_err =
        |context: String| move |source: std::io::Error| LogError::Io { context, source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(io_err(format!("create directory {}", parent.display())))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .map_err(io_err(format!("write temp log {}", tmp_path.display())))?;
    fs::rename(&tmp_path, path).map_err(io_err(format!("replace log {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn missing_store_is_empty_for_listing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonFileLog::new(temp.path().join("plan.json"));
        assert!(!log.exists());
        assert!(log.list_all().is_empty());
        assert!(matches!(log.entries(), Err(LogError::Missing(_))));
    }

    #[test]
    fn append_assigns_dense_ordinals() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonFileLog::new(temp.path().join("nested/plan.json"));
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(log.append(text).expect("append"), i as u32 + 1);
        }
        assert!(log.exists());
        assert_eq!(log.list_all(), vec!["a", "b", "c"]);
    }

    #[test]
    fn lists_in_numeric_not_lexicographic_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonFileLog::new(temp.path().join("plan.json"));
        for i in 1..=12 {
            log.append(&format!("entry {i}")).expect("append");
        }
        let values = log.list_all();
        assert_eq!(values[8], "entry 9");
        assert_eq!(values[9], "entry 10");
        assert_eq!(values[11], "entry 12");

        let raw = fs::read_to_string(log.path()).expect("read");
        let nine = raw.find("\"9\"").expect("key 9");
        let ten = raw.find("\"10\"").expect("key 10");
        assert!(nine < ten);
    }

    #[test]
    fn reads_hand_written_files_with_gaps() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        fs::write(&path, r#"{"10": "ten", "2": "two", "9": "nine"}"#).expect("write");
        let log = JsonFileLog::new(&path);
        assert_eq!(log.list_all(), vec!["two", "nine", "ten"]);
        assert_eq!(log.append("eleven").expect("append"), 11);
    }

    #[test]
    fn corrupt_store_lists_empty_but_refuses_append() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        fs::write(&path, "{not json").expect("write");
        let log = JsonFileLog::new(&path);

        assert!(log.list_all().is_empty());
        assert!(matches!(log.entries(), Err(LogError::Corrupt { .. })));
        assert!(matches!(log.append("x"), Err(LogError::Corrupt { .. })));
        assert_eq!(fs::read_to_string(&path).expect("read"), "{not json");
    }

    #[test]
    fn append_after_largest_ordinal_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        let original = r#"{"4294967295": "x"}"#;
        fs::write(&path, original).expect("write");
        let log = JsonFileLog::new(&path);

        let err = log.append("y").unwrap_err();
        assert!(
            matches!(err, LogError::Corrupt { ref reason, .. } if reason == "ordinal space exhausted")
        );
        assert_eq!(fs::read_to_string(&path).expect("read"), original);
    }

    #[test]
    fn schema_rejects_non_ordinal_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        fs::write(&path, r#"{"first": "a"}"#).expect("write");
        let log = JsonFileLog::new(&path);
        assert!(matches!(log.entries(), Err(LogError::Corrupt { .. })));

        fs::write(&path, r#"{"1": 7}"#).expect("write");
        assert!(matches!(log.entries(), Err(LogError::Corrupt { .. })));
    }

    #[test]
    fn clear_removes_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonFileLog::new(temp.path().join("plan.json"));
        log.append("a").expect("append");
        log.clear().expect("clear");
        assert!(!log.exists());
        log.clear().expect("clear is idempotent");
        assert_eq!(log.append("b").expect("append"), 1);
    }

    #[test]
    fn concurrent_appends_never_collide() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = Arc::new(JsonFileLog::new(temp.path().join("knowledge.json")));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || log.append(&format!("fact {i}")).expect("append"))
            })
            .collect();
        let mut ordinals: Vec<u32> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, (1..=8).collect::<Vec<_>>());
        assert_eq!(log.list_all().len(), 8);
    }
}
