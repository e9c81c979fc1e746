//! Concurrent ticket creation against the assignment worker
//!
//! Tickets opened from many tasks at once must spread evenly across idle
//! agents: no agent may end up more than one ticket ahead of another.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use tokio::task::JoinSet;
use uuid::Uuid;

use helpdesk_engine::{DeskConfig, Role, SupportDesk, TicketStatus, User};

async fn seed(desk: &SupportDesk, agents: usize) -> (Vec<User>, User) {
    let mut roster = Vec::new();
    for i in 0..agents {
        roster.push(
            desk.directory()
                .register(&format!("agent{}@desk.test", i), "Agent", &i.to_string(), Role::Agent)
                .await
                .unwrap(),
        );
    }
    let customer = desk
        .directory()
        .register("customer@desk.test", "Cy", "Customer", Role::Customer)
        .await
        .unwrap();
    (roster, customer)
}

async fn create_concurrently(desk: &SupportDesk, customer_id: Uuid, count: usize) {
    let mut tasks = JoinSet::new();
    for i in 0..count {
        let service = desk.tickets().clone();
        tasks.spawn(async move {
            service
                .create_ticket(customer_id, &format!("Issue {}", i), "Details", None)
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_creation_balances_load() {
    let desk = SupportDesk::in_memory(DeskConfig::default());
    let (agents, customer) = seed(&desk, 4).await;

    create_concurrently(&desk, customer.id, 40).await;

    let mut loads = HashMap::new();
    for agent in &agents {
        loads.insert(agent.id, desk.workload().load(agent.id).await.unwrap());
    }
    let total: u64 = loads.values().sum();
    let max = *loads.values().max().unwrap();
    let min = *loads.values().min().unwrap();

    assert_eq!(total, 40);
    assert_eq!(max, 10, "loads: {:?}", loads);
    assert!(max - min <= 1);
    assert!(desk.tickets().unassigned_tickets().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_uneven_counts_stay_within_ceiling() {
    let desk = SupportDesk::in_memory(DeskConfig::default());
    let (agents, customer) = seed(&desk, 3).await;

    create_concurrently(&desk, customer.id, 10).await;

    for agent in &agents {
        // ceil(10 / 3) = 4
        assert!(desk.workload().load(agent.id).await.unwrap() <= 4);
    }
    let stats = desk.tickets().stats().await.unwrap();
    assert_eq!(stats.total, 10);
    assert_eq!(stats.open, 10);
    assert_eq!(stats.unassigned_active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_small_queue_still_serves_every_caller() {
    let config = DeskConfig {
        assignment_queue_depth: 1,
        ..DeskConfig::default()
    };
    let desk = SupportDesk::in_memory(config);
    let (agents, customer) = seed(&desk, 2).await;

    create_concurrently(&desk, customer.id, 20).await;

    for agent in &agents {
        assert_eq!(desk.workload().load(agent.id).await.unwrap(), 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_status_writes_keep_one_value() {
    let desk = SupportDesk::in_memory(DeskConfig::default());
    let (agents, customer) = seed(&desk, 2).await;
    let ticket = desk
        .tickets()
        .create_ticket(customer.id, "Race", "Two agents at once", None)
        .await
        .unwrap();

    let ticket_id = ticket.id;
    let mut tasks = JoinSet::new();
    for (i, agent) in agents.iter().cycle().take(20).enumerate() {
        let service = desk.tickets().clone();
        let agent_id = agent.id;
        let status = if i % 2 == 0 {
            TicketStatus::InProgress
        } else {
            TicketStatus::Resolved
        };
        tasks.spawn(async move { service.set_status(ticket_id, status, agent_id).await });
    }
    let mut last_write = None;
    while let Some(joined) = tasks.join_next().await {
        let updated = joined.unwrap().unwrap();
        if last_write
            .as_ref()
            .map_or(true, |prev: &helpdesk_engine::Ticket| updated.updated_at > prev.updated_at)
        {
            last_write = Some(updated);
        }
    }

    let stored = desk.tickets().ticket(ticket_id).await.unwrap();
    assert_eq!(Some(stored.status), last_write.map(|t| t.status));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pair_fills_the_idle_agent_first() {
    let desk = SupportDesk::in_memory(DeskConfig::default());
    let (agents, customer) = seed(&desk, 2).await;
    let (a, b) = (agents[0].id, agents[1].id);

    // A takes the first ticket, B the second; resolving A's leaves A at 0, B at 1
    let first = desk
        .tickets()
        .create_ticket(customer.id, "First", "Details", None)
        .await
        .unwrap();
    desk.tickets()
        .create_ticket(customer.id, "Second", "Details", None)
        .await
        .unwrap();
    desk.tickets()
        .set_status(first.id, TicketStatus::Resolved, a)
        .await
        .unwrap();
    assert_eq!(desk.workload().load(a).await.unwrap(), 0);
    assert_eq!(desk.workload().load(b).await.unwrap(), 1);

    create_concurrently(&desk, customer.id, 2).await;

    // Either order yields A then the A/B tie, which A wins
    assert_eq!(desk.workload().load(a).await.unwrap(), 2);
    assert_eq!(desk.workload().load(b).await.unwrap(), 1);
    assert!(desk.tickets().unassigned_tickets().await.unwrap().is_empty());
}
