//! Test-only helpers: scripted collaborators and throwaway workspaces.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::SearchHit;
use crate::io::collaborators::Collaborators;
use crate::io::init::prepare_layout;
use crate::workspace::Workspace;

/// Collaborators that answer from scripted data and record what was asked.
#[derive(Debug, Default)]
pub struct ScriptedCollaborators {
    answers: RefCell<VecDeque<Option<String>>>,
    search_results: Vec<SearchHit>,
    search_error: Option<String>,
    pages: BTreeMap<String, String>,
    references: BTreeMap<String, String>,
    search_calls: RefCell<Vec<String>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedCollaborators {
    /// Queue an answer for the next `ask_user`; `None` is a blank reply.
    pub fn with_answer(self, answer: Option<&str>) -> Self {
        self.answers
            .borrow_mut()
            .push_back(answer.map(str::to_string));
        self
    }

    pub fn with_search_results(mut self, hits: Vec<SearchHit>) -> Self {
        self.search_results = hits;
        self
    }

    pub fn with_search_error(mut self, message: &str) -> Self {
        self.search_error = Some(message.to_string());
        self
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    pub fn with_reference(mut self, title: &str, text: &str) -> Self {
        self.references.insert(title.to_string(), text.to_string());
        self
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.borrow().clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }
}

impl Collaborators for ScriptedCollaborators {
    fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.search_calls.borrow_mut().push(query.to_string());
        match &self.search_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(self.search_results.clone()),
        }
    }

    fn fetch_page(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted page for {url}"))
    }

    fn lookup_reference(&self, title: &str) -> Result<Option<String>> {
        Ok(self.references.get(title).cloned())
    }

    fn ask_user(&self, prompt: &str) -> Result<Option<String>> {
        self.questions.borrow_mut().push(prompt.to_string());
        Ok(self.answers.borrow_mut().pop_front().flatten())
    }
}

/// A workspace rooted in a temporary directory with default config.
pub struct TestWorkspace {
    temp: TempDir,
    workspace: Workspace,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let workspace = Workspace::open(temp.path())?;
        prepare_layout(workspace.paths())?;
        Ok(Self { temp, workspace })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}
