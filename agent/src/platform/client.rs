//! HTTP client for the graph platform
//!
//! Artifacts come from the storage REST endpoint, entity reads/writes and
//! branch management go through the GraphQL endpoint. The GraphQL document
//! shapes live here and nowhere else.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::AgentError;
use crate::models::status::DeploymentStatus;
use crate::platform::{ApplicationContext, EntityStore, ObjectStore, TicketSummary};

/// Header carrying the platform API token.
const AUTH_HEADER: &str = "X-INFRAHUB-KEY";

/// HTTP client for the graph platform
pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_token: SecretString,
}

impl PlatformClient {
    /// Create a new platform client
    pub fn new(
        base_url: &str,
        api_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        // A malformed base address is rejected at construction.
        Url::parse(base_url)
            .map_err(|e| AgentError::ConfigError(format!("invalid platform url {}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Run a GraphQL query against a branch and return the `data` object.
    async fn graphql(
        &self,
        branch: &str,
        query: String,
    ) -> Result<serde_json::Value, AgentError> {
        let url = format!("{}/graphql/{}", self.base_url, branch);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, self.api_token.expose_secret())
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Platform query failed: {} - {}", status, body);
            return Err(AgentError::PlatformError(format!("{}: {}", status, body)));
        }

        let body: serde_json::Value = response.json().await?;
        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(AgentError::PlatformError(format!(
                    "graphql errors: {}",
                    serde_json::Value::Array(errors.clone())
                )));
            }
        }

        Ok(body.get("data").cloned().unwrap_or(serde_json::Value::Null))
    }
}

/// First node object under `data.{kind}.edges`.
fn first_node<'a>(data: &'a serde_json::Value, kind: &str) -> Option<&'a serde_json::Value> {
    data.get(kind)?.get("edges")?.get(0)?.get("node")
}

fn node_str(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(|s| s.to_string())
}

#[async_trait]
impl ObjectStore for PlatformClient {
    async fn fetch_artifact(&self, storage_id: &str) -> Result<Option<String>, AgentError> {
        let url = format!("{}/api/storage/object/{}", self.base_url, storage_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTH_HEADER, self.api_token.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Artifact fetch failed: {} - {}", status, body);
            return Err(AgentError::PlatformError(format!("{}: {}", status, body)));
        }

        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl EntityStore for PlatformClient {
    async fn application_context(
        &self,
        kind: &str,
        id: &str,
        branch: &str,
    ) -> Result<ApplicationContext, AgentError> {
        let query = format!(
            "query {{ {kind}(ids: [\"{id}\"]) {{ edges {{ node {{ \
             cluster {{ node {{ primary_address {{ node {{ address {{ value }} }} }} }} }} \
             entity {{ node {{ name {{ value }} }} }} \
             }} }} }} }}"
        );
        let data = self.graphql(branch, query).await?;

        let node = first_node(&data, kind).ok_or_else(|| {
            AgentError::PlatformError(format!("{} {} not found on branch {}", kind, id, branch))
        })?;

        let address = node_str(
            node,
            &["cluster", "node", "primary_address", "node", "address", "value"],
        )
        .ok_or_else(|| {
            AgentError::PlatformError(format!("{} {} has no cluster primary address", kind, id))
        })?;
        let entity_name = node_str(node, &["entity", "node", "name", "value"]).ok_or_else(|| {
            AgentError::PlatformError(format!("{} {} has no owning entity", kind, id))
        })?;

        // Addresses are stored with their prefix length; the device client
        // wants the bare host.
        let cluster_address = address
            .split('/')
            .next()
            .unwrap_or(address.as_str())
            .to_string();

        Ok(ApplicationContext {
            cluster_address,
            entity_name,
        })
    }

    async fn write_deployment_status(
        &self,
        kind: &str,
        id: &str,
        status: DeploymentStatus,
    ) -> Result<(), AgentError> {
        let mutation = format!(
            "mutation {{ {kind}Update(data: {{ id: \"{id}\", \
             deployment_status: {{ value: \"{status}\" }} }}) {{ ok }} }}"
        );
        let data = self.graphql("main", mutation).await?;

        let ok = data
            .get(format!("{kind}Update").as_str())
            .and_then(|update| update.get("ok"))
            .and_then(|ok| ok.as_bool())
            .unwrap_or(false);
        if !ok {
            return Err(AgentError::PlatformError(format!(
                "deployment status update rejected for {} {}",
                kind, id
            )));
        }

        info!("Set deployment status of {} {} to {}", kind, id, status);
        Ok(())
    }

    async fn ensure_branch(&self, name: &str, description: &str) -> Result<String, AgentError> {
        let data = self
            .graphql("main", "query { Branch { name } }".to_string())
            .await?;

        let exists = data
            .get("Branch")
            .and_then(|branches| branches.as_array())
            .map(|branches| {
                branches
                    .iter()
                    .any(|branch| branch.get("name").and_then(|n| n.as_str()) == Some(name))
            })
            .unwrap_or(false);
        if exists {
            debug!("Branch {} already exists, reusing it", name);
            return Ok(name.to_string());
        }

        let mutation = format!(
            "mutation {{ BranchCreate(data: {{ name: \"{name}\", \
             description: \"{description}\", sync_with_git: false }}) \
             {{ ok object {{ name }} }} }}"
        );
        let data = self.graphql("main", mutation).await?;

        let created = node_str(&data, &["BranchCreate", "object", "name"]).ok_or_else(|| {
            AgentError::PlatformError(format!("branch creation rejected for {}", name))
        })?;

        info!("Created branch {}", created);
        Ok(created)
    }

    async fn ticket_summary(
        &self,
        node_id: &str,
        branch: &str,
    ) -> Result<TicketSummary, AgentError> {
        let kind = "NetautoServiceNowTicket";
        let query = format!(
            "query {{ {kind}(ids: [\"{node_id}\"]) {{ edges {{ node {{ \
             ritm {{ value }} status {{ value }} cat_item {{ value }} \
             short_description {{ value }} sys_id {{ value }} \
             }} }} }} }}"
        );
        let data = self.graphql(branch, query).await?;

        let node = first_node(&data, kind).ok_or_else(|| {
            AgentError::PlatformError(format!("ticket {} not found on branch {}", node_id, branch))
        })?;

        let field = |name: &str| node_str(node, &[name, "value"]).unwrap_or_default();
        Ok(TicketSummary {
            ritm: field("ritm"),
            status: field("status"),
            cat_item: field("cat_item"),
            short_description: field("short_description"),
            sys_id: field("sys_id"),
        })
    }
}
