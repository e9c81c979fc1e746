//! Helpdesk Engine
//!
//! Routes customer tickets to the least-loaded active agent and governs how
//! tickets and their message threads may change.
//!
//! ## Modules
//! - `directory`: users and the active agent roster
//! - `workload`: per-agent open-ticket load
//! - `assignment`: least-loaded selection and the worker serializing assignments
//! - `tickets`: ticket creation, status, priority and assignment changes
//! - `messages`: replies, internal notes and status messages
//! - `events`: broadcast of committed changes
//! - `store`: persistence traits with in-memory and Postgres implementations

pub mod assignment;
pub mod config;
pub mod desk;
pub mod directory;
pub mod events;
pub mod messages;
pub mod store;
pub mod tickets;
pub mod workload;

pub use assignment::{AssignmentHandle, AssignmentSelector, AssignmentWorker};
pub use config::{ConfigError, DeskConfig};
pub use desk::SupportDesk;
pub use directory::AgentDirectory;
pub use events::{DeskEvent, EventHub};
pub use messages::MessageThread;
pub use tickets::{TicketService, TicketStats};
pub use workload::{AgentWorkload, LoadStatus, WorkloadCounter};

pub use helpdesk_shared::{
    AssignmentReason, AssignmentRecord, DeskError, DeskResult, Message, MessageType, Role, Ticket,
    TicketPriority, TicketStatus, User,
};
