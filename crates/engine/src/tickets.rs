//! Ticket state machine
//!
//! Creation, status/priority changes and (re)assignment. Any status may
//! follow any other; the only gate is who may make the change. Assignment
//! writes are delegated to the assignment worker.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use helpdesk_shared::{
    AssignmentRecord, DeskError, DeskResult, Ticket, TicketPriority, TicketStatus, User,
};

use crate::assignment::AssignmentHandle;
use crate::directory::AgentDirectory;
use crate::events::{DeskEvent, EventHub};
use crate::store::{TicketFilter, TicketStore};

/// Ticket counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub total: u64,
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub closed: u64,
    pub reopened: u64,
    /// OPEN or IN_PROGRESS tickets with no agent
    pub unassigned_active: u64,
}

/// Reject blank or over-long text, returning it trimmed
pub(crate) fn validate_text(field: &str, value: &str, max_len: usize) -> DeskResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeskError::Validation(format!("{} cannot be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(DeskError::Validation(format!(
            "{} too long (max {} characters)",
            field, max_len
        )));
    }
    Ok(value.to_string())
}

#[derive(Clone)]
pub struct TicketService {
    directory: AgentDirectory,
    tickets: Arc<dyn TicketStore>,
    assignment: AssignmentHandle,
    events: EventHub,
    max_title_length: usize,
    max_content_length: usize,
}

impl TicketService {
    pub fn new(
        directory: AgentDirectory,
        tickets: Arc<dyn TicketStore>,
        assignment: AssignmentHandle,
        events: EventHub,
        max_title_length: usize,
        max_content_length: usize,
    ) -> Self {
        Self {
            directory,
            tickets,
            assignment,
            events,
            max_title_length,
            max_content_length,
        }
    }

    /// Open a ticket for a customer and auto-assign it
    ///
    /// Priority defaults to MEDIUM. Having no active agent is not an error;
    /// the ticket is stored unassigned.
    pub async fn create_ticket(
        &self,
        actor_id: Uuid,
        title: &str,
        description: &str,
        priority: Option<TicketPriority>,
    ) -> DeskResult<Ticket> {
        let actor = self.directory.resolve(actor_id).await?;
        if !actor.role.is_customer() {
            tracing::warn!(user_id = %actor_id, "Ticket creation by non-customer rejected");
            return Err(DeskError::Authorization(
                "Only customers can create tickets".to_string(),
            ));
        }

        let title = validate_text("Title", title, self.max_title_length)?;
        let description = validate_text("Description", description, self.max_content_length)?;
        let ticket = Ticket::open(actor.id, title, description, priority.unwrap_or_default());

        let ticket = self.assignment.create(ticket).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            customer_id = %ticket.customer_id,
            priority = %ticket.priority,
            agent_id = ?ticket.assigned_agent_id,
            "Ticket created"
        );
        self.events.publish(DeskEvent::created(&ticket));
        Ok(ticket)
    }

    pub async fn set_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
        actor_id: Uuid,
    ) -> DeskResult<Ticket> {
        self.require_agent_actor(ticket_id, actor_id, "change ticket status")
            .await?;

        let ticket = self
            .tickets
            .update_ticket(
                ticket_id,
                Box::new(move |t: &mut Ticket| -> DeskResult<()> {
                    t.set_status(status);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(ticket_id = %ticket_id, status = %status, agent_id = %actor_id, "Ticket status updated");
        self.events.publish(DeskEvent::status_changed(&ticket));
        Ok(ticket)
    }

    pub async fn set_priority(
        &self,
        ticket_id: Uuid,
        priority: TicketPriority,
        actor_id: Uuid,
    ) -> DeskResult<Ticket> {
        self.require_agent_actor(ticket_id, actor_id, "change ticket priority")
            .await?;

        let ticket = self
            .tickets
            .update_ticket(
                ticket_id,
                Box::new(move |t: &mut Ticket| -> DeskResult<()> {
                    t.set_priority(priority);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(ticket_id = %ticket_id, priority = %priority, agent_id = %actor_id, "Ticket priority updated");
        self.events.publish(DeskEvent::priority_changed(&ticket));
        Ok(ticket)
    }

    /// Hand a ticket to a specific agent; the agent need not be active
    pub async fn assign(&self, ticket_id: Uuid, agent_id: Uuid) -> DeskResult<Ticket> {
        let ticket = self.assignment.assign(ticket_id, agent_id).await?;
        self.events.publish(DeskEvent::assignment_changed(&ticket));
        Ok(ticket)
    }

    pub async fn unassign(&self, ticket_id: Uuid) -> DeskResult<Ticket> {
        let ticket = self.assignment.unassign(ticket_id).await?;
        self.events.publish(DeskEvent::assignment_changed(&ticket));
        Ok(ticket)
    }

    /// Ensure the ticket exists and the actor is an agent
    async fn require_agent_actor(
        &self,
        ticket_id: Uuid,
        actor_id: Uuid,
        action: &str,
    ) -> DeskResult<User> {
        self.ticket(ticket_id).await?;
        let actor = self.directory.resolve(actor_id).await?;
        if !actor.role.is_agent() {
            tracing::warn!(ticket_id = %ticket_id, user_id = %actor_id, action, "Non-agent mutation rejected");
            return Err(DeskError::Authorization(format!(
                "Only agents can {}",
                action
            )));
        }
        Ok(actor)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn ticket(&self, ticket_id: Uuid) -> DeskResult<Ticket> {
        self.tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::not_found("ticket", ticket_id))
    }

    pub async fn all_tickets(&self) -> DeskResult<Vec<Ticket>> {
        self.tickets.query_tickets(&TicketFilter::all()).await
    }

    pub async fn tickets_for_customer(&self, customer_id: Uuid) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::customer(customer_id))
            .await
    }

    pub async fn tickets_for_agent(&self, agent_id: Uuid) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::agent(agent_id))
            .await
    }

    pub async fn unassigned_tickets(&self) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::unassigned())
            .await
    }

    pub async fn open_tickets_for_customer(&self, customer_id: Uuid) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::customer(customer_id).with_status(TicketStatus::Open))
            .await
    }

    pub async fn in_progress_tickets_for_agent(&self, agent_id: Uuid) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::agent(agent_id).with_status(TicketStatus::InProgress))
            .await
    }

    pub async fn tickets_with_status(&self, status: TicketStatus) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::all().with_status(status))
            .await
    }

    pub async fn tickets_with_priority(&self, priority: TicketPriority) -> DeskResult<Vec<Ticket>> {
        self.tickets
            .query_tickets(&TicketFilter::all().with_priority(priority))
            .await
    }

    /// Assignment changes of a ticket, oldest first
    pub async fn assignment_history(&self, ticket_id: Uuid) -> DeskResult<Vec<AssignmentRecord>> {
        self.ticket(ticket_id).await?;
        self.tickets.assignment_history(ticket_id).await
    }

    pub async fn stats(&self) -> DeskResult<TicketStats> {
        let tickets = self.all_tickets().await?;
        let mut stats = TicketStats::default();
        for ticket in &tickets {
            stats.total += 1;
            match ticket.status {
                TicketStatus::Open => stats.open += 1,
                TicketStatus::InProgress => stats.in_progress += 1,
                TicketStatus::Resolved => stats.resolved += 1,
                TicketStatus::Closed => stats.closed += 1,
                TicketStatus::Reopened => stats.reopened += 1,
            }
            if ticket.assigned_agent_id.is_none() && ticket.status.counts_toward_load() {
                stats.unassigned_active += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text_trims() {
        assert_eq!(validate_text("Title", "  Printer  ", 10).unwrap(), "Printer");
    }

    #[test]
    fn test_validate_text_rejects_blank() {
        let err = validate_text("Title", " \n\t ", 10).unwrap_err();
        assert_eq!(err, DeskError::Validation("Title cannot be empty".to_string()));
    }

    #[test]
    fn test_validate_text_counts_characters() {
        assert!(validate_text("Title", "ééééé", 5).is_ok());
        assert!(matches!(
            validate_text("Title", "ééééé!", 5),
            Err(DeskError::Validation(_))
        ));
    }
}
