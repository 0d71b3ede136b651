//! Durable core of an autonomous research workflow.
//!
//! An orchestrating model plans a research task as ordered steps, works
//! through them one at a time while saving findings, and is only allowed to
//! write a final report once every step has been reached. All state lives in
//! small JSON files so a crashed or restarted process resumes where it left
//! off.
//!
//! - **[`core`]**: Pure logic (progress state machine, stream classifier,
//!   title sanitizing). No I/O.
//! - **[`io`]**: Side effects (keyed logs, progress file, config, reports,
//!   external commands).
//!
//! Orchestration modules ([`plan`], [`knowledge`], [`gate`], [`workspace`],
//! [`tools`], [`session`]) combine the two to serve tool calls and CLI
//! commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod gate;
pub mod io;
pub mod knowledge;
pub mod logging;
pub mod plan;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
pub mod workspace;
