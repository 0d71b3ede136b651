//! Accumulated research notes.

use tracing::{info, instrument, warn};

use crate::error::ResearchError;
use crate::io::keyed_log::{KeyedLog, LogError};
use crate::plan::append_error;

/// Append-only knowledge base over a [`KeyedLog`].
#[derive(Debug)]
pub struct KnowledgeStore<L: KeyedLog> {
    log: L,
}

impl<L: KeyedLog> KnowledgeStore<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Persist a note and return its ordinal.
    #[instrument(skip_all)]
    pub fn save(&self, text: &str) -> Result<u32, ResearchError> {
        let ordinal = self.log.append(text).map_err(append_error)?;
        info!(ordinal, "knowledge saved");
        Ok(ordinal)
    }

    /// Every note in save order. An unreadable store recalls as empty.
    pub fn recall_all(&self) -> Vec<String> {
        match self.log.entries() {
            Ok(entries) => entries.into_iter().map(|e| e.value).collect(),
            Err(LogError::Missing(_)) => Vec::new(),
            Err(err) => {
                warn!(err = %err, "knowledge unreadable, recalling nothing");
                Vec::new()
            }
        }
    }

    pub fn clear(&self) -> Result<(), ResearchError> {
        self.log.clear().map_err(append_error)
    }
}
