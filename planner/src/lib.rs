//! Subtask planner: a bounded plan tree and a tool-call resolver.
//!
//! A goal is decomposed into a hierarchical plan of subtasks that agents
//! refine through split/add/delete/exit rounds, never touching work at or
//! before the frontier. Model output is turned into schema-valid tool
//! invocations with a single repair attempt. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (ids, invariants, mutations, rounds).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, plan files, prompts, the
//!   generation process). Isolated behind traits to enable scripting in tests.
//! - **[`tools`]** and **[`agents`]**: tool-call resolution and the agent
//!   capabilities built on the generation collaborator.
//!
//! Orchestration modules ([`select`], [`refine`], [`resolve`], [`validate`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod refine;
pub mod resolve;
pub mod select;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
pub mod tree;
pub mod validate;
