//! Ticket staging flow
//!
//! Handles `node.created` events for ticket nodes: stages an isolated
//! branch for the ticket and routes on the catalog item. The service
//! implementations themselves live outside this subsystem.

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AgentError;
use crate::models::event::{NodeData, WebhookPayload};
use crate::platform::EntityStore;

/// What the ticket flow did, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TicketOutcome {
    pub ritm: String,
    pub cat_item: String,
    pub branch: String,
}

/// Stage a ticket: ensure its implementation branch exists and route the
/// catalog item.
pub(crate) async fn stage_ticket(
    entities: &dyn EntityStore,
    payload: &WebhookPayload,
    node: &NodeData,
) -> Result<TicketOutcome, AgentError> {
    let ritm = payload.ritm().ok_or_else(|| {
        AgentError::ValidationError("ticket event carries no ritm attribute".to_string())
    })?;

    // One branch per ticket; re-delivery of the same event reuses it.
    let branch_name = format!("ticket/{}", ritm);
    let branch = entities
        .ensure_branch(
            &branch_name,
            &format!("Implementation branch for ticket {}", ritm),
        )
        .await?;

    let ticket = entities.ticket_summary(&node.node_id, &payload.branch).await?;
    info!(
        "Staged ticket {} ({}) on branch {}",
        ticket.ritm, ticket.short_description, branch
    );

    match ticket.cat_item.as_str() {
        "segment" => {
            info!("Ticket {} requests a segment service", ticket.ritm);
        }
        "application" => {
            info!("Ticket {} requests an application service", ticket.ritm);
        }
        other => {
            warn!("Ticket {} has unknown catalog item {:?}", ticket.ritm, other);
        }
    }

    Ok(TicketOutcome {
        ritm: ticket.ritm,
        cat_item: ticket.cat_item,
        branch,
    })
}
