//! Deployment orchestrator
//!
//! Validates inbound events, routes them to a handler and tracks the
//! per-target deployment status. Each call to [`Orchestrator::handle_event`]
//! is one unit of work under an external scheduler; mutual exclusion for
//! runs against the same target is the scheduler's per-key concurrency
//! limit.

use std::sync::Arc;

use tracing::{error, info, Instrument};

use crate::deploy::application::deploy_application;
use crate::deploy::connector::DeviceConnector;
use crate::deploy::fsm::RunFsm;
use crate::deploy::router::{HandlerKind, HandlerRegistry};
use crate::deploy::ticket::{stage_ticket, TicketOutcome};
use crate::errors::AgentError;
use crate::models::event::{validate_event, ArtifactData, EventKind, WebhookData, WebhookPayload};
use crate::platform::{EntityStore, ObjectStore};
use crate::utils::generate_uuid;

/// What a completed run did.
#[derive(Debug)]
pub enum RunOutcome {
    /// An application declaration was deployed to its cluster.
    Deployed {
        target_kind: String,
        target_id: String,
    },

    /// A ticket was staged onto its implementation branch.
    TicketStaged(TicketOutcome),
}

/// Event-driven deployment orchestrator.
pub struct Orchestrator {
    entities: Arc<dyn EntityStore>,
    objects: Arc<dyn ObjectStore>,
    connector: DeviceConnector,
    registry: HandlerRegistry,
}

impl Orchestrator {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        objects: Arc<dyn ObjectStore>,
        connector: DeviceConnector,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            entities,
            objects,
            connector,
            registry,
        }
    }

    /// Run one deployment for one inbound event.
    ///
    /// Validation and routing failures surface before any status write;
    /// once a run is accepted, its target goes `running` and ends up
    /// `deployed` or `failed`. Failures are re-raised after the status
    /// write so the scheduler's own retry/alerting policy applies.
    pub async fn handle_event(&self, raw: &serde_json::Value) -> Result<RunOutcome, AgentError> {
        let (payload, kind) = validate_event(raw)?;
        let handler = self.registry.resolve(payload.target_kind())?;

        let run_id = generate_uuid();
        let span = tracing::info_span!(
            "deployment_run",
            run = %run_id,
            event = %payload.event,
            target = %payload.target_id(),
        );

        match handler {
            HandlerKind::Application => {
                let WebhookData::Artifact(artifact) = &payload.data else {
                    return Err(AgentError::ValidationError(
                        "application target events must carry artifact data".to_string(),
                    ));
                };
                if !matches!(kind, EventKind::ArtifactCreated | EventKind::ArtifactUpdated) {
                    return Err(AgentError::ValidationError(format!(
                        "event {} cannot drive an application deployment",
                        payload.event
                    )));
                }
                self.run_application(&payload, artifact).instrument(span).await
            }
            HandlerKind::Ticket => {
                let WebhookData::Node(node) = &payload.data else {
                    return Err(AgentError::ValidationError(
                        "ticket target events must carry node data".to_string(),
                    ));
                };
                if kind != EventKind::NodeCreated {
                    return Err(AgentError::ValidationError(format!(
                        "event {} has no ticket handler",
                        payload.event
                    )));
                }
                let outcome = stage_ticket(self.entities.as_ref(), &payload, node)
                    .instrument(span)
                    .await?;
                Ok(RunOutcome::TicketStaged(outcome))
            }
        }
    }

    async fn run_application(
        &self,
        payload: &WebhookPayload,
        artifact: &ArtifactData,
    ) -> Result<RunOutcome, AgentError> {
        let mut fsm = RunFsm::new();

        let running = fsm.begin().map_err(AgentError::Internal)?;
        if let Err(e) = self
            .entities
            .write_deployment_status(&artifact.target_kind, &artifact.target_id, running)
            .await
        {
            self.record_failure(&mut fsm, artifact).await;
            return Err(e);
        }

        let result = deploy_application(
            self.entities.as_ref(),
            self.objects.as_ref(),
            &self.connector,
            payload,
            artifact,
        )
        .await;

        match result {
            Ok(()) => {
                let deployed = fsm.complete().map_err(AgentError::Internal)?;
                self.entities
                    .write_deployment_status(&artifact.target_kind, &artifact.target_id, deployed)
                    .await?;
                info!("Deployment of {} complete", artifact.target_id);
                Ok(RunOutcome::Deployed {
                    target_kind: artifact.target_kind.clone(),
                    target_id: artifact.target_id.clone(),
                })
            }
            Err(e) => {
                error!("Deployment of {} failed: {}", artifact.target_id, e);
                self.record_failure(&mut fsm, artifact).await;
                Err(e)
            }
        }
    }

    /// Write the terminal `failed` status with best-effort delivery: a
    /// failed status write is logged, not retried, and never replaces the
    /// original error.
    async fn record_failure(&self, fsm: &mut RunFsm, artifact: &ArtifactData) {
        match fsm.fail() {
            Ok(status) => {
                if let Err(write_err) = self
                    .entities
                    .write_deployment_status(&artifact.target_kind, &artifact.target_id, status)
                    .await
                {
                    error!(
                        "Could not record failed status for {}: {}",
                        artifact.target_id, write_err
                    );
                }
            }
            Err(sequence_err) => {
                error!("Status sequence violation: {}", sequence_err);
            }
        }
    }
}
