//! AS3 application deployment flow

use tracing::{debug, info};

use crate::deploy::connector::DeviceConnector;
use crate::errors::AgentError;
use crate::models::event::{ArtifactData, WebhookPayload};
use crate::platform::{EntityStore, ObjectStore};
use crate::utils::sha256_hash;

/// Deploy the declaration artifact addressed by an artifact event.
///
/// Resolves the target cluster and tenant, fetches the artifact payload and
/// posts it as a per-application declaration. Status writes stay with the
/// orchestrator; everything here either succeeds or returns the error that
/// drives the `failed` transition.
pub(crate) async fn deploy_application(
    entities: &dyn EntityStore,
    objects: &dyn ObjectStore,
    connector: &DeviceConnector,
    payload: &WebhookPayload,
    artifact: &ArtifactData,
) -> Result<(), AgentError> {
    // Resolve where to deploy and which tenant owns the application.
    let context = entities
        .application_context(&artifact.target_kind, &artifact.target_id, &payload.branch)
        .await?;
    info!(
        "Deploying {} {} to cluster {} (tenant {})",
        artifact.target_kind, artifact.target_id, context.cluster_address, context.entity_name
    );

    // A missing or unparseable artifact short-circuits the run.
    let raw = objects
        .fetch_artifact(&artifact.storage_id)
        .await?
        .ok_or_else(|| {
            AgentError::PayloadError(format!(
                "artifact {} not found in object store",
                artifact.storage_id
            ))
        })?;
    let declaration: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        AgentError::PayloadError(format!(
            "artifact {} is not valid JSON: {}",
            artifact.storage_id, e
        ))
    })?;
    debug!(
        "Artifact {} fetched, {} bytes, sha256 {}",
        artifact.storage_id,
        raw.len(),
        sha256_hash(raw.as_bytes())
    );

    let device = connector.connect(&context.cluster_address).await?;
    device
        .post_application(&context.entity_name, &declaration)
        .await?;

    info!(
        "Declaration for {} posted to tenant {}",
        artifact.target_id, context.entity_name
    );
    Ok(())
}
