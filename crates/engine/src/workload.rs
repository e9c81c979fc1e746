//! Workload counter
//!
//! An agent's load is the number of tickets assigned to them whose status is
//! OPEN or IN_PROGRESS. It is always read from the store at call time.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use helpdesk_shared::{DeskResult, TicketStatus, User};

use crate::store::TicketStore;

/// Coarse load bucket for the workload view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Low,
    Normal,
    High,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the staff workload view
#[derive(Debug, Clone, Serialize)]
pub struct AgentWorkload {
    pub agent_id: Uuid,
    pub email: String,
    pub name: String,
    pub active: bool,
    pub open_tickets: u64,
    pub in_progress_tickets: u64,
    pub load: u64,
    pub load_status: LoadStatus,
}

/// Computes agent load on demand
#[derive(Clone)]
pub struct WorkloadCounter {
    tickets: Arc<dyn TicketStore>,
    normal_threshold: u64,
    high_threshold: u64,
}

impl WorkloadCounter {
    pub fn new(tickets: Arc<dyn TicketStore>, normal_threshold: u64, high_threshold: u64) -> Self {
        Self {
            tickets,
            normal_threshold,
            high_threshold,
        }
    }

    /// Tickets assigned to `agent_id` that are OPEN or IN_PROGRESS
    pub async fn load(&self, agent_id: Uuid) -> DeskResult<u64> {
        self.tickets
            .count_assigned(agent_id, &TicketStatus::ACTIVE)
            .await
    }

    pub fn classify(&self, load: u64) -> LoadStatus {
        if load > self.high_threshold {
            LoadStatus::High
        } else if load > self.normal_threshold {
            LoadStatus::Normal
        } else {
            LoadStatus::Low
        }
    }

    /// Workload of each agent, busiest first; equal loads keep input order
    pub async fn report(&self, agents: &[User]) -> DeskResult<Vec<AgentWorkload>> {
        let mut rows = Vec::with_capacity(agents.len());
        for agent in agents {
            let open_tickets = self
                .tickets
                .count_assigned(agent.id, &[TicketStatus::Open])
                .await?;
            let in_progress_tickets = self
                .tickets
                .count_assigned(agent.id, &[TicketStatus::InProgress])
                .await?;
            let load = open_tickets + in_progress_tickets;

            rows.push(AgentWorkload {
                agent_id: agent.id,
                email: agent.email.clone(),
                name: agent.full_name(),
                active: agent.active,
                open_tickets,
                in_progress_tickets,
                load,
                load_status: self.classify(load),
            });
        }

        rows.sort_by(|a, b| b.load.cmp(&a.load));
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use helpdesk_shared::{Role, Ticket, TicketPriority};

    async fn assign_ticket(store: &MemoryStore, agent: Uuid, status: TicketStatus) {
        let mut ticket = Ticket::open(Uuid::new_v4(), "T", "D", TicketPriority::Medium);
        ticket.set_assignee(Some(agent));
        ticket.set_status(status);
        store.insert_ticket(&ticket).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_counts_open_and_in_progress_only() {
        let store = Arc::new(MemoryStore::new());
        let agent = Uuid::new_v4();
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
            TicketStatus::Reopened,
        ] {
            assign_ticket(&store, agent, status).await;
        }

        let counter = WorkloadCounter::new(store, 8, 15);
        assert_eq!(counter.load(agent).await.unwrap(), 3);
        assert_eq!(counter.load(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[test]
    fn test_classify_thresholds() {
        let counter = WorkloadCounter::new(Arc::new(MemoryStore::new()), 8, 15);
        assert_eq!(counter.classify(0), LoadStatus::Low);
        assert_eq!(counter.classify(8), LoadStatus::Low);
        assert_eq!(counter.classify(9), LoadStatus::Normal);
        assert_eq!(counter.classify(15), LoadStatus::Normal);
        assert_eq!(counter.classify(16), LoadStatus::High);
    }

    #[tokio::test]
    async fn test_report_orders_busiest_first() {
        let store = Arc::new(MemoryStore::new());
        let idle = User::new("idle@desk.test", "Idle", "Agent", Role::Agent);
        let busy = User::new("busy@desk.test", "Busy", "Agent", Role::Agent);
        assign_ticket(&store, busy.id, TicketStatus::Open).await;
        assign_ticket(&store, busy.id, TicketStatus::InProgress).await;

        let counter = WorkloadCounter::new(store, 1, 2);
        let report = counter.report(&[idle.clone(), busy.clone()]).await.unwrap();

        assert_eq!(report[0].agent_id, busy.id);
        assert_eq!(report[0].open_tickets, 1);
        assert_eq!(report[0].in_progress_tickets, 1);
        assert_eq!(report[0].load_status, LoadStatus::Normal);
        assert_eq!(report[1].agent_id, idle.id);
        assert_eq!(report[1].load, 0);

        let json = serde_json::to_value(&report[1]).unwrap();
        assert_eq!(json["load_status"], "low");
    }
}
