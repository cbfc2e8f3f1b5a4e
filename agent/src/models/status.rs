//! Deployment status attached to target entities

use serde::{Deserialize, Serialize};

/// Deployment status of a target entity.
///
/// Written with last-writer-wins semantics; no history is retained here.
/// The orchestrator itself only ever writes `Running`, `Deployed` and
/// `Failed`; the remaining values come from the entity's initial default
/// or external intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Deployed,
    Failed,
    Crashed,
    Unknown,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Crashed => "crashed",
            DeploymentStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
