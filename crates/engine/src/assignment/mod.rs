//! Least-loaded agent assignment
//!
//! [`AssignmentSelector`] is the pure policy; [`AssignmentWorker`] is the
//! task through which every assignment decision and write is serialized.

mod worker;

pub use worker::{AssignmentHandle, AssignmentWorker};

use helpdesk_shared::{DeskResult, User};

use crate::directory::AgentDirectory;
use crate::workload::WorkloadCounter;

/// Picks the active agent with the smallest current load
///
/// Ties go to the agent that comes first in directory order, i.e. the
/// earliest registered. Loads are read fresh on every call.
#[derive(Clone)]
pub struct AssignmentSelector {
    directory: AgentDirectory,
    workload: WorkloadCounter,
}

impl AssignmentSelector {
    pub fn new(directory: AgentDirectory, workload: WorkloadCounter) -> Self {
        Self {
            directory,
            workload,
        }
    }

    /// Choose an agent for a new ticket; `None` when no agent is active
    pub async fn select_agent(&self) -> DeskResult<Option<User>> {
        let candidates = self.directory.active_agents().await?;

        let mut best: Option<(User, u64)> = None;
        for agent in candidates {
            let load = self.workload.load(agent.id).await?;
            tracing::debug!(agent_id = %agent.id, load, "Assignment candidate");

            // Strictly smaller wins, so the earliest candidate keeps ties
            let better = match &best {
                Some((_, best_load)) => load < *best_load,
                None => true,
            };
            if better {
                best = Some((agent, load));
            }
        }

        match &best {
            Some((agent, load)) => {
                tracing::debug!(agent_id = %agent.id, load, "Selected least-loaded agent");
            }
            None => tracing::debug!("No active agents available for assignment"),
        }
        Ok(best.map(|(agent, _)| agent))
    }
}
