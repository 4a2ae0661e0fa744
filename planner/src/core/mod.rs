//! Deterministic, pure logic shared by the planner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod id;
pub mod immutability;
pub mod invariants;
pub mod mutation;
pub mod retry;
pub mod round;
pub mod selector;
pub mod types;
