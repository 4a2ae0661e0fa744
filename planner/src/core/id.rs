//! Dot-addressed subtask identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Position of a subtask in the plan tree, rendered as `1.2.3`.
///
/// Components are 1-based sibling positions from the top level down. The
/// derived ordering compares components lexicographically and places a prefix
/// before its extensions, which is exactly the pre-order traversal order of
/// the plan tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubtaskId(Vec<u32>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid subtask id '{input}': {reason}")]
pub struct ParseIdError {
    input: String,
    reason: &'static str,
}

impl SubtaskId {
    /// Build an id from its components. Returns `None` for an empty sequence
    /// or any zero component.
    pub fn new(components: Vec<u32>) -> Option<Self> {
        if components.is_empty() || components.contains(&0) {
            return None;
        }
        Some(Self(components))
    }

    /// Id of the `position`-th (1-based) top-level subtask.
    pub fn top(position: u32) -> Self {
        Self(vec![position.max(1)])
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Final component: the 1-based position among siblings.
    pub fn position(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    /// Id of the parent, or `None` for a top-level subtask.
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() == 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Id of the `position`-th child of this subtask.
    pub fn child(&self, position: u32) -> Self {
        let mut components = self.0.clone();
        components.push(position.max(1));
        Self(components)
    }

    /// Same parent, different final component.
    pub fn with_position(&self, position: u32) -> Self {
        let mut components = self.0.clone();
        let last = components.len() - 1;
        components[last] = position.max(1);
        Self(components)
    }

    /// True if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &SubtaskId) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for SubtaskId {
    type Err = ParseIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseIdError {
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(err("empty id"));
        }
        let mut components = Vec::new();
        for part in trimmed.split('.') {
            let value: u32 = part.parse().map_err(|_| err("non-numeric component"))?;
            if value == 0 {
                return Err(err("components are 1-based"));
            }
            components.push(value);
        }
        Ok(Self(components))
    }
}

impl Serialize for SubtaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SubtaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
