//! Tool schemas and the tool-call resolution pipeline.

pub mod envelope;
pub mod registry;
pub mod resolver;
