//! Records and enums shared across the helpdesk engine
//!
//! Records are plain data keyed by UUID. Relationships (ticket -> customer,
//! ticket -> agent, message -> ticket) are stored as ids and resolved through
//! explicit lookups, never as embedded object graphs.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::DeskError;

// =============================================================================
// Enums
// =============================================================================

/// Role of a user in the support desk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Agent,
}

impl Role {
    /// Agents may change ticket status/priority, author notes and receive assignments
    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent)
    }

    /// Customers may open tickets
    pub fn is_customer(&self) -> bool {
        matches!(self, Self::Customer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Agent => "AGENT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "CUSTOMER" => Ok(Self::Customer),
            "AGENT" => Ok(Self::Agent),
            _ => Err(DeskError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Ticket lifecycle status
///
/// Any status may follow any other; there is no enforced transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    Reopened,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TicketStatus {
    /// Statuses that count towards an agent's load
    pub const ACTIVE: [TicketStatus; 2] = [TicketStatus::Open, TicketStatus::InProgress];

    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
        TicketStatus::Reopened,
    ];

    /// Whether a ticket in this status contributes to its agent's workload
    pub fn counts_toward_load(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
            Self::Reopened => "REOPENED",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "OPEN" => Ok(Self::Open),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "RESOLVED" => Ok(Self::Resolved),
            "CLOSED" => Ok(Self::Closed),
            "REOPENED" => Ok(Self::Reopened),
            _ => Err(DeskError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

/// Ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            _ => Err(DeskError::Validation(format!("Invalid priority: {}", s))),
        }
    }
}

/// Kind of message in a ticket thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Regular reply from customer or agent
    Reply,
    /// Internal note, agent-only and deletable
    Note,
    /// System message describing a status change
    StatusUpdate,
    /// Assignment notification
    Assignment,
}

impl MessageType {
    /// Notes are the only message kind that may be removed from a thread
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Note)
    }

    /// Notes stay out of customer-facing threads and broadcasts
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Note)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "REPLY",
            Self::Note => "NOTE",
            Self::StatusUpdate => "STATUS_UPDATE",
            Self::Assignment => "ASSIGNMENT",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an assignment changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentReason {
    /// Chosen by the least-loaded selector at creation
    Auto,
    /// Explicit `assign` call
    Manual,
    /// Explicit `unassign` call
    Unassign,
}

/// Accept `in-progress`, `In Progress` and `IN_PROGRESS` alike
fn normalize(s: &str) -> String {
    s.trim().to_uppercase().replace(['-', ' '], "_")
}

// =============================================================================
// Records
// =============================================================================

/// A customer or agent known to the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// Only active agents receive new assignments
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Eligible for automatic assignment
    pub fn is_assignable(&self) -> bool {
        self.role.is_agent() && self.active
    }
}

/// A customer-reported issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub customer_id: Uuid,
    pub assigned_agent_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Ticket {
    /// Build a fresh OPEN ticket for a customer
    pub fn open(
        customer_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: TicketPriority,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            status: TicketStatus::Open,
            priority,
            customer_id,
            assigned_agent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TicketStatus) {
        self.status = status;
        self.touch();
    }

    pub fn set_priority(&mut self, priority: TicketPriority) {
        self.priority = priority;
        self.touch();
    }

    /// Replace the assignee, returning the previous one
    pub fn set_assignee(&mut self, agent_id: Option<Uuid>) -> Option<Uuid> {
        let previous = std::mem::replace(&mut self.assigned_agent_id, agent_id);
        self.touch();
        previous
    }

    /// Whether this ticket counts towards `agent_id`'s load
    pub fn is_active_for(&self, agent_id: Uuid) -> bool {
        self.assigned_agent_id == Some(agent_id) && self.status.counts_toward_load()
    }

    fn touch(&mut self) {
        let now = OffsetDateTime::now_utc();
        // Keep updated_at strictly monotonic even on coarse clocks
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + time::Duration::microseconds(1)
        };
    }
}

/// An entry in a ticket's thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Message {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub message_type: MessageType,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    pub fn new(
        ticket_id: Uuid,
        sender_id: Uuid,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            sender_id,
            message_type,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// One committed change of a ticket's assignee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct AssignmentRecord {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub assigned_from: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub reason: AssignmentReason,
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
}

impl AssignmentRecord {
    pub fn new(
        ticket_id: Uuid,
        assigned_from: Option<Uuid>,
        assigned_to: Option<Uuid>,
        reason: AssignmentReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            assigned_from,
            assigned_to,
            reason,
            assigned_at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_accepts_common_spellings() {
        assert_eq!("open".parse::<TicketStatus>().unwrap(), TicketStatus::Open);
        assert_eq!(
            "in_progress".parse::<TicketStatus>().unwrap(),
            TicketStatus::InProgress
        );
        assert_eq!(
            "In Progress".parse::<TicketStatus>().unwrap(),
            TicketStatus::InProgress
        );
        assert_eq!(
            " REOPENED ".parse::<TicketStatus>().unwrap(),
            TicketStatus::Reopened
        );
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let err = "escalated".parse::<TicketStatus>().unwrap_err();
        assert!(matches!(err, DeskError::Validation(_)));
    }

    #[test]
    fn test_priority_parsing_and_default() {
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
        assert_eq!(
            "urgent".parse::<TicketPriority>().unwrap(),
            TicketPriority::Urgent
        );
        assert!(matches!(
            "critical".parse::<TicketPriority>(),
            Err(DeskError::Validation(_))
        ));
    }

    #[test]
    fn test_only_open_and_in_progress_count_toward_load() {
        assert!(TicketStatus::Open.counts_toward_load());
        assert!(TicketStatus::InProgress.counts_toward_load());
        assert!(!TicketStatus::Resolved.counts_toward_load());
        assert!(!TicketStatus::Closed.counts_toward_load());
        assert!(!TicketStatus::Reopened.counts_toward_load());
    }

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let back: TicketStatus = serde_json::from_str("\"CLOSED\"").unwrap();
        assert_eq!(back, TicketStatus::Closed);
    }

    #[test]
    fn test_ticket_mutations_advance_updated_at() {
        let mut ticket = Ticket::open(Uuid::new_v4(), "Printer", "Jammed", TicketPriority::Low);
        let created = ticket.updated_at;

        ticket.set_status(TicketStatus::InProgress);
        let after_status = ticket.updated_at;
        assert!(after_status > created);

        ticket.set_priority(TicketPriority::High);
        assert!(ticket.updated_at > after_status);
        assert_eq!(ticket.created_at, created);
    }

    #[test]
    fn test_set_assignee_returns_previous() {
        let mut ticket = Ticket::open(Uuid::new_v4(), "VPN", "Drops", TicketPriority::Medium);
        let agent = Uuid::new_v4();

        assert_eq!(ticket.set_assignee(Some(agent)), None);
        assert!(ticket.is_active_for(agent));
        assert_eq!(ticket.set_assignee(None), Some(agent));
        assert!(!ticket.is_active_for(agent));
    }

    #[test]
    fn test_only_notes_are_deletable() {
        assert!(MessageType::Note.is_deletable());
        assert!(!MessageType::Reply.is_deletable());
        assert!(!MessageType::StatusUpdate.is_deletable());
        assert!(!MessageType::Assignment.is_deletable());
    }

    #[test]
    fn test_inactive_agent_is_not_assignable() {
        let mut agent = User::new("a@desk.test", "Ada", "Agent", Role::Agent);
        assert!(agent.is_assignable());
        agent.active = false;
        assert!(!agent.is_assignable());

        let customer = User::new("c@desk.test", "Cy", "Customer", Role::Customer);
        assert!(!customer.is_assignable());
        assert_eq!(customer.full_name(), "Cy Customer");
    }
}
