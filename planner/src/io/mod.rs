//! I/O helpers for planner commands.

pub mod config;
pub mod generator;
pub mod init;
pub mod process;
pub mod prompt;
pub mod tree_store;
