//! Inbound change event model
//!
//! Wire structures for the webhook payloads the platform emits. Field names
//! follow the platform exactly, including the historical `occured_at`
//! spelling.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Recognized event types. Anything outside this set is rejected at the
/// boundary, never silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ArtifactCreated,
    ArtifactUpdated,
    NodeCreated,
    NodeUpdated,
}

impl EventKind {
    pub fn parse(event: &str) -> Result<Self, AgentError> {
        match event {
            "infrahub.artifact.created" => Ok(EventKind::ArtifactCreated),
            "infrahub.artifact.updated" => Ok(EventKind::ArtifactUpdated),
            "infrahub.node.created" => Ok(EventKind::NodeCreated),
            "infrahub.node.updated" => Ok(EventKind::NodeUpdated),
            other => Err(AgentError::ValidationError(format!(
                "unrecognized event type: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ArtifactCreated => "infrahub.artifact.created",
            EventKind::ArtifactUpdated => "infrahub.artifact.updated",
            EventKind::NodeCreated => "infrahub.node.created",
            EventKind::NodeUpdated => "infrahub.node.updated",
        }
    }
}

/// Complete webhook payload. Immutable once received; one payload drives
/// exactly one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub id: String,
    pub event: String,
    pub branch: String,
    pub account_id: String,
    #[serde(deserialize_with = "deserialize_occured_at")]
    pub occured_at: DateTime<Utc>,
    pub data: WebhookData,
}

/// Event-specific data section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebhookData {
    Artifact(ArtifactData),
    Node(NodeData),
}

/// Data for artifact lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactData {
    pub node_id: String,
    pub checksum: String,
    pub target_id: String,
    pub storage_id: String,
    pub target_kind: String,
    pub checksum_previous: String,
    pub storage_id_previous: String,
    pub artifact_definition_id: String,
}

/// Data for node lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: String,
    pub action: String,
    pub node_id: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub changelog: Option<Changelog>,
}

/// Changelog carried on node events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changelog {
    pub node_id: String,
    pub node_kind: String,
    #[serde(default)]
    pub display_label: String,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeChange>,
}

/// One changed attribute in a changelog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeChange {
    pub kind: String,
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub value_previous: Option<serde_json::Value>,
    #[serde(default = "default_update_status")]
    pub value_update_status: String,
}

fn default_update_status() -> String {
    "added".to_string()
}

impl WebhookPayload {
    /// Target kind this event addresses.
    pub fn target_kind(&self) -> &str {
        match &self.data {
            WebhookData::Artifact(data) => &data.target_kind,
            WebhookData::Node(data) => &data.kind,
        }
    }

    /// Target entity id this event addresses.
    pub fn target_id(&self) -> &str {
        match &self.data {
            WebhookData::Artifact(data) => &data.target_id,
            WebhookData::Node(data) => &data.node_id,
        }
    }

    /// Attribute value from a node event changelog, if present.
    pub fn attribute_value(&self, attr_name: &str) -> Option<&serde_json::Value> {
        match &self.data {
            WebhookData::Node(data) => data
                .changelog
                .as_ref()
                .and_then(|changelog| changelog.attributes.get(attr_name))
                .map(|change| &change.value),
            WebhookData::Artifact(_) => None,
        }
    }

    fn attribute_str(&self, attr_name: &str) -> Option<&str> {
        self.attribute_value(attr_name).and_then(|v| v.as_str())
    }

    /// Ticket request item number, from the changelog.
    pub fn ritm(&self) -> Option<&str> {
        self.attribute_str("ritm")
    }

    /// Ticket catalog item, from the changelog.
    pub fn cat_item(&self) -> Option<&str> {
        self.attribute_str("cat_item")
    }

    /// Ticket short description, from the changelog.
    pub fn short_description(&self) -> Option<&str> {
        self.attribute_str("short_description")
    }
}

/// Parse and validate a raw webhook body.
///
/// A malformed payload or an unrecognized event type is a
/// [`AgentError::ValidationError`]: a rejection the caller reports, not a
/// skip.
pub fn validate_event(raw: &serde_json::Value) -> Result<(WebhookPayload, EventKind), AgentError> {
    let payload: WebhookPayload = serde_json::from_value(raw.clone())
        .map_err(|e| AgentError::ValidationError(format!("invalid webhook payload: {}", e)))?;
    let kind = EventKind::parse(&payload.event)?;
    Ok((payload, kind))
}

/// The platform emits both RFC 3339 timestamps and space-separated ones.
fn deserialize_occured_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z")
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| format!("invalid occured_at timestamp {:?}: {}", raw, e))
}
