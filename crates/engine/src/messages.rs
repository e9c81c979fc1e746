//! Ticket message threads
//!
//! Messages are appended in display order. Notes are internal: only agents
//! write them, they never leave the engine as events and they are the only
//! kind that can be deleted.

use std::sync::Arc;

use uuid::Uuid;

use helpdesk_shared::{DeskError, DeskResult, Message, MessageType, Ticket};

use crate::directory::AgentDirectory;
use crate::events::{DeskEvent, EventHub};
use crate::store::{MessageStore, TicketStore};
use crate::tickets::validate_text;

#[derive(Clone)]
pub struct MessageThread {
    directory: AgentDirectory,
    tickets: Arc<dyn TicketStore>,
    messages: Arc<dyn MessageStore>,
    events: EventHub,
    max_content_length: usize,
}

impl MessageThread {
    pub fn new(
        directory: AgentDirectory,
        tickets: Arc<dyn TicketStore>,
        messages: Arc<dyn MessageStore>,
        events: EventHub,
        max_content_length: usize,
    ) -> Self {
        Self {
            directory,
            tickets,
            messages,
            events,
            max_content_length,
        }
    }

    /// Append a reply from any existing user
    pub async fn add_reply(
        &self,
        ticket_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> DeskResult<Message> {
        self.require_ticket(ticket_id).await?;
        let sender = self.directory.resolve(sender_id).await?;
        let content = validate_text("Message content", content, self.max_content_length)?;

        self.append(Message::new(ticket_id, sender.id, MessageType::Reply, content))
            .await
    }

    /// Append an internal note; agents only
    pub async fn add_note(
        &self,
        ticket_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> DeskResult<Message> {
        self.require_ticket(ticket_id).await?;
        let sender = self.directory.resolve(sender_id).await?;
        if !sender.role.is_agent() {
            tracing::warn!(ticket_id = %ticket_id, user_id = %sender_id, "Note by non-agent rejected");
            return Err(DeskError::Authorization(
                "Only agents can add notes".to_string(),
            ));
        }
        let content = validate_text("Note content", content, self.max_content_length)?;

        self.append(Message::new(ticket_id, sender.id, MessageType::Note, content))
            .await
    }

    /// Append a system status message
    ///
    /// The sender is the assigned agent, or the owning customer when the
    /// ticket is unassigned.
    pub async fn add_status_update(&self, ticket_id: Uuid, text: &str) -> DeskResult<Message> {
        let ticket = self.require_ticket(ticket_id).await?;
        let sender_id = ticket.assigned_agent_id.unwrap_or(ticket.customer_id);
        let content = validate_text("Status text", text, self.max_content_length)?;

        self.append(Message::new(
            ticket_id,
            sender_id,
            MessageType::StatusUpdate,
            content,
        ))
        .await
    }

    /// Remove a note
    pub async fn delete_message(&self, message_id: Uuid) -> DeskResult<()> {
        let message = self
            .messages
            .get_message(message_id)
            .await?
            .ok_or_else(|| DeskError::not_found("message", message_id))?;

        if !message.message_type.is_deletable() {
            tracing::warn!(
                message_id = %message_id,
                message_type = %message.message_type,
                "Deletion of non-note message rejected"
            );
            return Err(DeskError::Validation("Only notes can be deleted".to_string()));
        }

        if !self.messages.delete_message(message_id).await? {
            return Err(DeskError::not_found("message", message_id));
        }

        tracing::info!(ticket_id = %message.ticket_id, message_id = %message_id, "Note deleted");
        self.events.publish(DeskEvent::MessageDeleted {
            ticket_id: message.ticket_id,
            message_id,
        });
        Ok(())
    }

    /// Full thread of a ticket, notes included
    pub async fn messages_for(&self, ticket_id: Uuid) -> DeskResult<Vec<Message>> {
        self.messages.messages_for_ticket(ticket_id).await
    }

    /// Thread as the customer sees it
    pub async fn customer_thread(&self, ticket_id: Uuid) -> DeskResult<Vec<Message>> {
        let mut thread = self.messages.messages_for_ticket(ticket_id).await?;
        thread.retain(|m| !m.message_type.is_internal());
        Ok(thread)
    }

    pub async fn messages_by(&self, sender_id: Uuid) -> DeskResult<Vec<Message>> {
        self.messages.messages_by_sender(sender_id).await
    }

    pub async fn by_id(&self, message_id: Uuid) -> DeskResult<Option<Message>> {
        self.messages.get_message(message_id).await
    }

    async fn require_ticket(&self, ticket_id: Uuid) -> DeskResult<Ticket> {
        self.tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::not_found("ticket", ticket_id))
    }

    async fn append(&self, message: Message) -> DeskResult<Message> {
        self.messages.insert_message(&message).await?;

        tracing::info!(
            ticket_id = %message.ticket_id,
            message_id = %message.id,
            message_type = %message.message_type,
            "Message added"
        );
        if !message.message_type.is_internal() {
            self.events.publish(DeskEvent::message_added(&message));
        }
        Ok(message)
    }
}
