//! Desk events and in-process fan-out
//!
//! Every committed mutation publishes a [`DeskEvent`]. The host service
//! subscribes and forwards events to websockets, webhooks or audit sinks.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use helpdesk_shared::{Message, MessageType, Ticket, TicketPriority, TicketStatus};

/// Events emitted by the engine
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskEvent {
    /// Ticket created, with the outcome of auto-assignment
    TicketCreated {
        ticket_id: Uuid,
        customer_id: Uuid,
        assigned_to: Option<Uuid>,
    },

    /// Ticket status/priority/assignment changed
    TicketUpdated {
        ticket_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<TicketStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        priority: Option<TicketPriority>,
        /// `Some(None)` means the ticket was unassigned
        #[serde(skip_serializing_if = "Option::is_none")]
        assigned_to: Option<Option<Uuid>>,
    },

    /// New customer-visible message added to a ticket
    NewMessage {
        ticket_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        message_type: MessageType,
    },

    /// A note was removed
    MessageDeleted { ticket_id: Uuid, message_id: Uuid },
}

impl DeskEvent {
    pub fn created(ticket: &Ticket) -> Self {
        Self::TicketCreated {
            ticket_id: ticket.id,
            customer_id: ticket.customer_id,
            assigned_to: ticket.assigned_agent_id,
        }
    }

    pub fn status_changed(ticket: &Ticket) -> Self {
        Self::TicketUpdated {
            ticket_id: ticket.id,
            status: Some(ticket.status),
            priority: None,
            assigned_to: None,
        }
    }

    pub fn priority_changed(ticket: &Ticket) -> Self {
        Self::TicketUpdated {
            ticket_id: ticket.id,
            status: None,
            priority: Some(ticket.priority),
            assigned_to: None,
        }
    }

    pub fn assignment_changed(ticket: &Ticket) -> Self {
        Self::TicketUpdated {
            ticket_id: ticket.id,
            status: None,
            priority: None,
            assigned_to: Some(ticket.assigned_agent_id),
        }
    }

    pub fn message_added(message: &Message) -> Self {
        Self::NewMessage {
            ticket_id: message.ticket_id,
            message_id: message.id,
            sender_id: message.sender_id,
            message_type: message.message_type,
        }
    }

    pub fn ticket_id(&self) -> Uuid {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::TicketUpdated { ticket_id, .. }
            | Self::NewMessage { ticket_id, .. }
            | Self::MessageDeleted { ticket_id, .. } => *ticket_id,
        }
    }
}

/// Broadcasts events to every subscriber
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<DeskEvent>,
}

impl EventHub {
    /// Create a hub buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.sender.subscribe()
    }

    /// Publish an event
    ///
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: DeskEvent) {
        match self.sender.send(event) {
            Ok(recipients) => {
                tracing::debug!(recipients, "Published desk event");
            }
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(
                    ticket_id = %event.ticket_id(),
                    "No subscribers for desk event"
                );
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(1024)
    }
}
