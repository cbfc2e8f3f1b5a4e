//! Graph platform collaborator interfaces
//!
//! The platform itself (the data source of truth) is an external system;
//! the orchestrator only depends on these two interfaces. The HTTP-backed
//! implementation lives in [`client`].

pub mod client;

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::models::status::DeploymentStatus;

/// Resolved context for a target application entity.
#[derive(Debug, Clone)]
pub struct ApplicationContext {
    /// Management address of the cluster fronting the application
    pub cluster_address: String,

    /// Name of the owning entity; doubles as the declaration tenant
    pub entity_name: String,
}

/// Summary of a ticket node.
#[derive(Debug, Clone)]
pub struct TicketSummary {
    pub ritm: String,
    pub status: String,
    pub cat_item: String,
    pub short_description: String,
    pub sys_id: String,
}

/// Artifact payload storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the raw artifact payload addressed by a storage id.
    ///
    /// A missing artifact is `None`; the caller decides whether that is an
    /// error.
    async fn fetch_artifact(&self, storage_id: &str) -> Result<Option<String>, AgentError>;
}

/// Entity attribute reads/writes and branch management.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Resolve the cluster address and entity name for a target application.
    async fn application_context(
        &self,
        kind: &str,
        id: &str,
        branch: &str,
    ) -> Result<ApplicationContext, AgentError>;

    /// Upsert the deployment status attribute on a target entity.
    /// Last-writer-wins; no history.
    async fn write_deployment_status(
        &self,
        kind: &str,
        id: &str,
        status: DeploymentStatus,
    ) -> Result<(), AgentError>;

    /// Make sure a branch with this name exists and return its name.
    ///
    /// Idempotent: an existing branch is reused, and exactly one creation
    /// call reaches the platform for a given name.
    async fn ensure_branch(&self, name: &str, description: &str) -> Result<String, AgentError>;

    /// Fetch the summary of a ticket node.
    async fn ticket_summary(
        &self,
        node_id: &str,
        branch: &str,
    ) -> Result<TicketSummary, AgentError>;
}
