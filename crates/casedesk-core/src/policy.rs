//! Assignment policy selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How pending work items are distributed across the agent pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// Cycle through agents in a fixed order established at planning start.
    /// Capacity is a soft preference, not an exclusion.
    RoundRobin,
    /// Pick the least-loaded agent with spare capacity for each item,
    /// overflowing to the globally least-loaded agent when no one has room.
    LoadBalanced,
}

impl AssignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentPolicy::RoundRobin => "round_robin",
            AssignmentPolicy::LoadBalanced => "load_balanced",
        }
    }
}

impl fmt::Display for AssignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "round-robin" => Ok(AssignmentPolicy::RoundRobin),
            "load_balanced" | "load-balanced" => Ok(AssignmentPolicy::LoadBalanced),
            other => Err(format!(
                "unknown assignment policy '{other}' (expected round_robin or load_balanced)"
            )),
        }
    }
}
