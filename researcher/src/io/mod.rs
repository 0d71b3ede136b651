//! I/O helpers for the research workflow.

pub mod collaborators;
pub mod config;
pub mod init;
pub mod keyed_log;
pub mod process;
pub mod progress_store;
pub mod report;
