//! Support desk wiring
//!
//! [`SupportDesk`] builds every component over one set of stores and owns
//! the assignment worker task. Hosts keep one instance in their shared
//! application state and clone the services they need.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use helpdesk_shared::{DeskResult, Role};

use crate::assignment::{AssignmentSelector, AssignmentWorker};
use crate::config::DeskConfig;
use crate::directory::AgentDirectory;
use crate::events::{DeskEvent, EventHub};
use crate::messages::MessageThread;
use crate::store::{MemoryStore, MessageStore, TicketStore, UserDirectory};
use crate::tickets::TicketService;
use crate::workload::{AgentWorkload, WorkloadCounter};

pub struct SupportDesk {
    config: DeskConfig,
    directory: AgentDirectory,
    workload: WorkloadCounter,
    selector: AssignmentSelector,
    tickets: TicketService,
    messages: MessageThread,
    events: EventHub,
    worker: JoinHandle<()>,
}

impl SupportDesk {
    /// Desk over a fresh in-memory store
    ///
    /// Must be called from within a tokio runtime.
    pub fn in_memory(config: DeskConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(config, store.clone(), store.clone(), store)
    }

    /// Desk over caller-provided stores
    pub fn with_stores(
        config: DeskConfig,
        users: Arc<dyn UserDirectory>,
        tickets: Arc<dyn TicketStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        let events = EventHub::new(config.event_capacity);
        let directory = AgentDirectory::new(users);
        let workload = WorkloadCounter::new(
            tickets.clone(),
            config.workload_normal_threshold,
            config.workload_high_threshold,
        );
        let selector = AssignmentSelector::new(directory.clone(), workload.clone());

        let (assignment, worker) =
            AssignmentWorker::new(selector.clone(), directory.clone(), tickets.clone())
                .spawn(config.assignment_queue_depth);

        let ticket_service = TicketService::new(
            directory.clone(),
            tickets.clone(),
            assignment,
            events.clone(),
            config.max_title_length,
            config.max_content_length,
        );
        let message_thread = MessageThread::new(
            directory.clone(),
            tickets,
            messages,
            events.clone(),
            config.max_content_length,
        );

        tracing::info!(
            queue_depth = config.assignment_queue_depth,
            event_capacity = config.event_capacity,
            "Support desk initialized"
        );

        Self {
            config,
            directory,
            workload,
            selector,
            tickets: ticket_service,
            messages: message_thread,
            events,
            worker,
        }
    }

    /// Desk over Postgres at `config.database_url`, running migrations first
    #[cfg(feature = "postgres")]
    pub async fn connect(config: DeskConfig) -> DeskResult<Self> {
        use helpdesk_shared::{create_pool, run_migrations, DeskError};

        use crate::store::PgStore;

        let url = config
            .database_url
            .clone()
            .ok_or_else(|| DeskError::Unavailable("DATABASE_URL is not set".to_string()))?;

        let pool = create_pool(&url, config.database_max_connections).await?;
        run_migrations(&pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            DeskError::Unavailable(format!("migrations failed: {}", e))
        })?;

        let store = Arc::new(PgStore::new(pool));
        Ok(Self::with_stores(config, store.clone(), store.clone(), store))
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn workload(&self) -> &WorkloadCounter {
        &self.workload
    }

    pub fn selector(&self) -> &AssignmentSelector {
        &self.selector
    }

    pub fn tickets(&self) -> &TicketService {
        &self.tickets
    }

    pub fn messages(&self) -> &MessageThread {
        &self.messages
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.events.subscribe()
    }

    /// Workload of every agent, active or not
    pub async fn workload_report(&self) -> DeskResult<Vec<AgentWorkload>> {
        let agents = self.directory.users_by_role(Role::Agent).await?;
        self.workload.report(&agents).await
    }

    /// Stop the assignment worker once queued commands have drained
    ///
    /// Clones of [`TicketService`] handed out earlier keep the worker alive
    /// until they are dropped too.
    pub async fn shutdown(self) {
        let Self {
            tickets, worker, ..
        } = self;
        drop(tickets);
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Assignment worker terminated abnormally");
        }
    }
}
