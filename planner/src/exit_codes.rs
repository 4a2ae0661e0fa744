//! Stable exit codes for planner CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config/plan/ops/registry or other errors.
pub const INVALID: i32 = 1;
/// `planner next` found no subtask after the frontier.
pub const EXHAUSTED: i32 = 2;
/// `planner refine` rejected a proposed operation.
pub const REJECTED: i32 = 3;
