//! Assignment worker
//!
//! A single task owns every assignment decision and write. Callers send
//! commands over a bounded queue and wait on a oneshot reply, so a load read
//! by the selector always reflects every assignment committed before it.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use helpdesk_shared::{AssignmentReason, AssignmentRecord, DeskError, DeskResult, Ticket};

use super::AssignmentSelector;
use crate::directory::AgentDirectory;
use crate::store::TicketStore;

type Reply = oneshot::Sender<DeskResult<Ticket>>;

enum Command {
    /// Select an agent for a new ticket and insert it with that assignee
    Create { ticket: Box<Ticket>, reply: Reply },
    Assign {
        ticket_id: Uuid,
        agent_id: Uuid,
        reply: Reply,
    },
    Unassign { ticket_id: Uuid, reply: Reply },
}

/// Cloneable sender side of the assignment queue
#[derive(Clone)]
pub struct AssignmentHandle {
    commands: mpsc::Sender<Command>,
}

impl AssignmentHandle {
    /// Auto-assign and insert a freshly built ticket
    pub async fn create(&self, ticket: Ticket) -> DeskResult<Ticket> {
        self.request(|reply| Command::Create {
            ticket: Box::new(ticket),
            reply,
        })
        .await
    }

    pub async fn assign(&self, ticket_id: Uuid, agent_id: Uuid) -> DeskResult<Ticket> {
        self.request(|reply| Command::Assign {
            ticket_id,
            agent_id,
            reply,
        })
        .await
    }

    pub async fn unassign(&self, ticket_id: Uuid) -> DeskResult<Ticket> {
        self.request(|reply| Command::Unassign { ticket_id, reply })
            .await
    }

    /// Whether the worker task has exited
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> DeskResult<Ticket> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| worker_stopped())?;
        response.await.map_err(|_| worker_stopped())?
    }
}

fn worker_stopped() -> DeskError {
    DeskError::Unavailable("assignment worker stopped".to_string())
}

/// Task serializing assignment decisions and writes
pub struct AssignmentWorker {
    selector: AssignmentSelector,
    directory: AgentDirectory,
    tickets: Arc<dyn TicketStore>,
}

impl AssignmentWorker {
    pub fn new(
        selector: AssignmentSelector,
        directory: AgentDirectory,
        tickets: Arc<dyn TicketStore>,
    ) -> Self {
        Self {
            selector,
            directory,
            tickets,
        }
    }

    /// Start the worker with a queue of `queue_depth` pending commands
    ///
    /// The task exits once every [`AssignmentHandle`] has been dropped.
    pub fn spawn(self, queue_depth: usize) -> (AssignmentHandle, JoinHandle<()>) {
        let (commands, queue) = mpsc::channel(queue_depth.max(1));
        let task = tokio::spawn(self.run(queue));
        (AssignmentHandle { commands }, task)
    }

    async fn run(self, mut queue: mpsc::Receiver<Command>) {
        tracing::info!("Assignment worker started");

        while let Some(command) = queue.recv().await {
            let (result, reply) = match command {
                Command::Create { ticket, reply } => (self.create(*ticket).await, reply),
                Command::Assign {
                    ticket_id,
                    agent_id,
                    reply,
                } => (self.assign(ticket_id, agent_id).await, reply),
                Command::Unassign { ticket_id, reply } => (self.unassign(ticket_id).await, reply),
            };

            if reply.send(result).is_err() {
                tracing::debug!("Assignment caller went away before the reply");
            }
        }

        tracing::info!("Assignment worker stopped");
    }

    async fn create(&self, mut ticket: Ticket) -> DeskResult<Ticket> {
        let agent = self.selector.select_agent().await?;
        let agent_id = agent.map(|a| a.id);
        ticket.assigned_agent_id = agent_id;

        let record = agent_id
            .map(|id| AssignmentRecord::new(ticket.id, None, Some(id), AssignmentReason::Auto));
        self.tickets
            .insert_assigned_ticket(&ticket, record.as_ref())
            .await?;

        match agent_id {
            Some(agent_id) => tracing::info!(
                ticket_id = %ticket.id,
                agent_id = %agent_id,
                "Ticket auto-assigned"
            ),
            None => tracing::info!(ticket_id = %ticket.id, "Ticket left unassigned"),
        }
        Ok(ticket)
    }

    async fn assign(&self, ticket_id: Uuid, agent_id: Uuid) -> DeskResult<Ticket> {
        let current = self
            .tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::not_found("ticket", ticket_id))?;

        let agent = self.directory.resolve(agent_id).await?;
        if !agent.role.is_agent() {
            tracing::warn!(ticket_id = %ticket_id, user_id = %agent_id, "Assignment to non-agent rejected");
            return Err(DeskError::Validation("User is not an agent".to_string()));
        }

        let updated = self
            .tickets
            .reassign_ticket(ticket_id, Some(agent_id), AssignmentReason::Manual)
            .await?;

        tracing::info!(
            ticket_id = %ticket_id,
            from = ?current.assigned_agent_id,
            agent_id = %agent_id,
            "Ticket assigned"
        );
        Ok(updated)
    }

    async fn unassign(&self, ticket_id: Uuid) -> DeskResult<Ticket> {
        let current = self
            .tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::not_found("ticket", ticket_id))?;

        let updated = self
            .tickets
            .reassign_ticket(ticket_id, None, AssignmentReason::Unassign)
            .await?;

        tracing::info!(ticket_id = %ticket_id, from = ?current.assigned_agent_id, "Ticket unassigned");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use helpdesk_shared::{Role, TicketPriority, User};

    use crate::store::{MemoryStore, UserDirectory};
    use crate::workload::WorkloadCounter;

    fn start(store: &Arc<MemoryStore>) -> (AssignmentHandle, JoinHandle<()>) {
        let directory = AgentDirectory::new(store.clone());
        let selector =
            AssignmentSelector::new(directory.clone(), WorkloadCounter::new(store.clone(), 8, 15));
        AssignmentWorker::new(selector, directory, store.clone()).spawn(4)
    }

    async fn user(store: &MemoryStore, email: &str, role: Role) -> User {
        let user = User::new(email, "U", email, role);
        store.insert_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_create_records_auto_assignment() {
        let store = Arc::new(MemoryStore::new());
        let agent = user(&store, "a@desk.test", Role::Agent).await;
        let (handle, _task) = start(&store);

        let ticket = Ticket::open(Uuid::new_v4(), "T", "D", TicketPriority::Medium);
        let created = handle.create(ticket).await.unwrap();
        assert_eq!(created.assigned_agent_id, Some(agent.id));

        let history = store.assignment_history(created.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, AssignmentReason::Auto);
        assert_eq!(history[0].assigned_to, Some(agent.id));
    }

    #[tokio::test]
    async fn test_assign_checks_ticket_then_agent_then_role() {
        let store = Arc::new(MemoryStore::new());
        let customer = user(&store, "c@desk.test", Role::Customer).await;
        let (handle, _task) = start(&store);

        let missing_ticket = handle.assign(Uuid::new_v4(), customer.id).await;
        assert!(matches!(missing_ticket, Err(DeskError::NotFound(_))));

        let ticket = handle
            .create(Ticket::open(customer.id, "T", "D", TicketPriority::Low))
            .await
            .unwrap();
        assert!(ticket.assigned_agent_id.is_none());

        let missing_agent = handle.assign(ticket.id, Uuid::new_v4()).await;
        assert!(matches!(missing_agent, Err(DeskError::NotFound(_))));

        let not_agent = handle.assign(ticket.id, customer.id).await;
        assert_eq!(
            not_agent.unwrap_err(),
            DeskError::Validation("User is not an agent".to_string())
        );
        assert!(store.assignment_history(ticket.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unassign_then_assign_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let agent = user(&store, "a@desk.test", Role::Agent).await;
        let (handle, _task) = start(&store);

        let ticket = handle
            .create(Ticket::open(Uuid::new_v4(), "T", "D", TicketPriority::Low))
            .await
            .unwrap();

        let cleared = handle.unassign(ticket.id).await.unwrap();
        assert!(cleared.assigned_agent_id.is_none());
        let restored = handle.assign(ticket.id, agent.id).await.unwrap();
        assert_eq!(restored.assigned_agent_id, Some(agent.id));

        let reasons: Vec<AssignmentReason> = store
            .assignment_history(ticket.id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.reason)
            .collect();
        assert_eq!(
            reasons,
            vec![
                AssignmentReason::Auto,
                AssignmentReason::Unassign,
                AssignmentReason::Manual
            ]
        );
    }

    #[tokio::test]
    async fn test_stopped_worker_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let (handle, task) = start(&store);
        task.abort();
        let _ = task.await;

        assert!(handle.is_closed());
        let result = handle
            .create(Ticket::open(Uuid::new_v4(), "T", "D", TicketPriority::Low))
            .await;
        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.ticket_count().await, 0);
    }
}
