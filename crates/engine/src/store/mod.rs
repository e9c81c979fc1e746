//! Store interfaces consumed by the engine
//!
//! The engine never owns persistence. It reads and writes plain records through
//! these traits; relationships are resolved by id. Implementations must make
//! [`TicketStore::update_ticket`] atomic per ticket.

use async_trait::async_trait;
use uuid::Uuid;

use helpdesk_shared::{
    AssignmentReason, AssignmentRecord, DeskResult, Message, Role, Ticket, TicketPriority,
    TicketStatus, User,
};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Mutation applied to a ticket under the store's per-ticket lock
///
/// Returning an error aborts the write and leaves the stored ticket unchanged.
pub type TicketMutation = Box<dyn FnOnce(&mut Ticket) -> DeskResult<()> + Send>;

/// Apply an assignee change, returning the history row it warrants
///
/// A ticket that was and stays unassigned gets no row.
pub(crate) fn apply_reassignment(
    ticket: &mut Ticket,
    agent_id: Option<Uuid>,
    reason: AssignmentReason,
) -> Option<AssignmentRecord> {
    let previous = ticket.set_assignee(agent_id);
    (previous.is_some() || agent_id.is_some())
        .then(|| AssignmentRecord::new(ticket.id, previous, agent_id, reason))
}

/// Filter on a ticket's assignee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssigneeFilter {
    #[default]
    Any,
    Unassigned,
    Agent(Uuid),
}

/// Criteria for [`TicketStore::query_tickets`]; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub customer_id: Option<Uuid>,
    pub assignee: AssigneeFilter,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

impl TicketFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn customer(customer_id: Uuid) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    pub fn agent(agent_id: Uuid) -> Self {
        Self {
            assignee: AssigneeFilter::Agent(agent_id),
            ..Self::default()
        }
    }

    pub fn unassigned() -> Self {
        Self {
            assignee: AssigneeFilter::Unassigned,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TicketPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(customer_id) = self.customer_id {
            if ticket.customer_id != customer_id {
                return false;
            }
        }
        let assignee_ok = match self.assignee {
            AssigneeFilter::Any => true,
            AssigneeFilter::Unassigned => ticket.assigned_agent_id.is_none(),
            AssigneeFilter::Agent(agent_id) => ticket.assigned_agent_id == Some(agent_id),
        };
        assignee_ok
            && self.status.map_or(true, |s| ticket.status == s)
            && self.priority.map_or(true, |p| ticket.priority == p)
    }
}

/// Resolves actors and lists agents
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> DeskResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> DeskResult<Option<User>>;

    /// Users with `role`, in registration order
    async fn users_by_role(&self, role: Role) -> DeskResult<Vec<User>>;

    /// Active agents in registration order; this order is the assignment tie-break
    async fn active_agents(&self) -> DeskResult<Vec<User>>;

    /// Insert a new user; a duplicate email is a validation error
    async fn insert_user(&self, user: &User) -> DeskResult<()>;

    async fn set_active(&self, id: Uuid, active: bool) -> DeskResult<User>;

    async fn update_profile(&self, id: Uuid, first_name: &str, last_name: &str)
        -> DeskResult<User>;
}

/// Ticket records and assignment history
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: &Ticket) -> DeskResult<()>;

    /// Insert a ticket together with the history row of its first assignment
    ///
    /// Both are written or neither is.
    async fn insert_assigned_ticket(
        &self,
        ticket: &Ticket,
        record: Option<&AssignmentRecord>,
    ) -> DeskResult<()>;

    async fn get_ticket(&self, id: Uuid) -> DeskResult<Option<Ticket>>;

    /// Atomically read, mutate and write one ticket, returning the stored result
    async fn update_ticket(&self, id: Uuid, mutation: TicketMutation) -> DeskResult<Ticket>;

    /// Matching tickets in creation order
    async fn query_tickets(&self, filter: &TicketFilter) -> DeskResult<Vec<Ticket>>;

    /// Number of tickets assigned to `agent_id` whose status is in `statuses`
    async fn count_assigned(&self, agent_id: Uuid, statuses: &[TicketStatus]) -> DeskResult<u64>;

    /// Atomically replace a ticket's assignee and append its history row
    ///
    /// Rows follow `apply_reassignment`; a failure leaves both untouched.
    async fn reassign_ticket(
        &self,
        id: Uuid,
        agent_id: Option<Uuid>,
        reason: AssignmentReason,
    ) -> DeskResult<Ticket>;

    async fn assignment_history(&self, ticket_id: Uuid) -> DeskResult<Vec<AssignmentRecord>>;
}

/// Ticket thread messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> DeskResult<()>;

    async fn get_message(&self, id: Uuid) -> DeskResult<Option<Message>>;

    /// Remove a message; returns false when it did not exist
    async fn delete_message(&self, id: Uuid) -> DeskResult<bool>;

    /// Messages of a ticket in insertion order
    async fn messages_for_ticket(&self, ticket_id: Uuid) -> DeskResult<Vec<Message>>;

    /// Messages authored by a user in insertion order
    async fn messages_by_sender(&self, sender_id: Uuid) -> DeskResult<Vec<Message>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_combines_criteria() {
        let customer = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let mut ticket = Ticket::open(customer, "Disk", "Full", TicketPriority::High);
        ticket.set_assignee(Some(agent));

        assert!(TicketFilter::all().matches(&ticket));
        assert!(TicketFilter::customer(customer).matches(&ticket));
        assert!(TicketFilter::agent(agent)
            .with_status(TicketStatus::Open)
            .matches(&ticket));
        assert!(!TicketFilter::agent(agent)
            .with_status(TicketStatus::InProgress)
            .matches(&ticket));
        assert!(!TicketFilter::unassigned().matches(&ticket));
        assert!(!TicketFilter::customer(customer)
            .with_priority(TicketPriority::Low)
            .matches(&ticket));
    }

    #[test]
    fn test_reassignment_rows() {
        let agent = Uuid::new_v4();
        let mut ticket = Ticket::open(Uuid::new_v4(), "Disk", "Full", TicketPriority::Low);

        assert!(apply_reassignment(&mut ticket, None, AssignmentReason::Unassign).is_none());

        let row = apply_reassignment(&mut ticket, Some(agent), AssignmentReason::Manual).unwrap();
        assert_eq!(row.assigned_from, None);
        assert_eq!(row.assigned_to, Some(agent));

        let row = apply_reassignment(&mut ticket, None, AssignmentReason::Unassign).unwrap();
        assert_eq!(row.assigned_from, Some(agent));
        assert_eq!(ticket.assigned_agent_id, None);
    }
}
