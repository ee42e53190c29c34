//! Discovery task record and its lifecycle enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, Result};
use crate::node::SeedKind;

/// Traversal discipline applied to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    #[default]
    BreadthFirst,
    DepthFirst,
}

impl TraversalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalMode::BreadthFirst => "breadth_first",
            TraversalMode::DepthFirst => "depth_first",
        }
    }
}

impl fmt::Display for TraversalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraversalMode {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "breadth_first" | "bfs" => Ok(TraversalMode::BreadthFirst),
            "depth_first" | "dfs" => Ok(TraversalMode::DepthFirst),
            other => Err(DiscoveryError::InvalidInput(format!("unknown traversal mode: {}", other))),
        }
    }
}

/// Lifecycle state of a discovery run. Everything except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(DiscoveryError::InvalidInput(format!("unknown task status: {}", other))),
        }
    }
}

/// Per-engine traversal bounds, fixed at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSettings {
    pub mode: TraversalMode,
    pub max_depth: u32,
    pub branching_factor: usize,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            mode: TraversalMode::BreadthFirst,
            max_depth: 3,
            branching_factor: 5,
        }
    }
}

/// One discovery run: identity, configuration and live progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTask {
    pub task_id: String,
    pub seed: String,
    pub seed_kind: SeedKind,
    pub mode: TraversalMode,
    pub max_depth: u32,
    pub branching_factor: usize,
    pub max_total_items: usize,
    pub status: TaskStatus,
    pub processed_count: usize,
    pub frontier_size: usize,
    pub last_processed_node: Option<String>,
    pub start_time: String,
    pub last_update: Option<String>,
    pub end_time: Option<String>,
    pub error_message: Option<String>,
}

impl DiscoveryTask {
    pub fn settings(&self) -> TraversalSettings {
        TraversalSettings {
            mode: self.mode,
            max_depth: self.max_depth,
            branching_factor: self.branching_factor,
        }
    }
}
