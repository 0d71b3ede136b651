//! Stable exit codes for researcher CLI commands.

/// Command succeeded, or `plan advance` moved to a step.
pub const OK: i32 = 0;
/// Command failed due to invalid input, config, or on-disk state.
pub const INVALID: i32 = 1;
/// `plan advance` found the plan complete.
pub const COMPLETE: i32 = 2;
/// `report` was refused because research is incomplete.
pub const INCOMPLETE: i32 = 3;
