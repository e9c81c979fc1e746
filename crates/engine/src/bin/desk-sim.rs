//! Support desk load simulation
//!
//! Seeds an in-memory desk with agents and customers, opens tickets from
//! concurrent tasks and prints the resulting workload distribution as JSON.
//!
//! Usage:
//!   cargo run --bin desk-sim
//!   cargo run --bin desk-sim -- <agents> <customers> <tickets>
//!
//! Logging follows `RUST_LOG` (default `info`); set `DESK_LOG_JSON=true` for
//! JSON log lines.

use std::env;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use helpdesk_engine::{DeskConfig, Role, SupportDesk, TicketPriority, TicketStatus};

const PRIORITIES: [TicketPriority; 4] = [
    TicketPriority::Low,
    TicketPriority::Medium,
    TicketPriority::High,
    TicketPriority::Urgent,
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("DESK_LOG_JSON")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn count_arg(position: usize, name: &str, default: usize) -> Result<usize> {
    match env::args().nth(position) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", name, raw)),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let agents = count_arg(1, "agents", 4)?;
    let customers = count_arg(2, "customers", 10)?;
    let tickets = count_arg(3, "tickets", 40)?;
    if customers == 0 && tickets > 0 {
        bail!("at least one customer is needed to open tickets");
    }

    let config = DeskConfig::from_env().context("invalid desk configuration")?;
    let desk = SupportDesk::in_memory(config);

    for i in 0..agents {
        desk.directory()
            .register(&format!("agent{}@desk.local", i), "Agent", &i.to_string(), Role::Agent)
            .await?;
    }
    let mut customer_ids = Vec::with_capacity(customers);
    for i in 0..customers {
        let customer = desk
            .directory()
            .register(
                &format!("customer{}@desk.local", i),
                "Customer",
                &i.to_string(),
                Role::Customer,
            )
            .await?;
        customer_ids.push(customer.id);
    }

    tracing::info!(agents, customers, tickets, "Opening tickets concurrently");

    let mut tasks = JoinSet::new();
    for i in 0..tickets {
        let service = desk.tickets().clone();
        let customer_id = customer_ids[i % customer_ids.len()];
        let priority = PRIORITIES[i % PRIORITIES.len()];
        tasks.spawn(async move {
            service
                .create_ticket(
                    customer_id,
                    &format!("Simulated issue #{}", i),
                    "Generated by desk-sim",
                    Some(priority),
                )
                .await
        });
    }

    let mut created = Vec::with_capacity(tickets);
    while let Some(joined) = tasks.join_next().await {
        created.push(joined.context("ticket task panicked")??);
    }

    // Agents pick up every other ticket so the report shows both buckets
    for ticket in created.iter().step_by(2) {
        if let Some(agent_id) = ticket.assigned_agent_id {
            desk.tickets()
                .set_status(ticket.id, TicketStatus::InProgress, agent_id)
                .await?;
        }
    }

    let report = desk.workload_report().await?;
    let stats = desk.tickets().stats().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "stats": stats,
            "workload": report,
        }))?
    );

    desk.shutdown().await;
    Ok(())
}
