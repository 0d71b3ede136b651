//! Deterministic, pure logic shared by the research workflow.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod progress;
pub mod title;
pub mod types;
