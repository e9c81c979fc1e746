//! PostgreSQL store
//!
//! Per-ticket atomicity comes from `SELECT ... FOR UPDATE` inside a
//! transaction; registration order for the assignment tie-break is the
//! `seq` column.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use helpdesk_shared::{
    AssignmentReason, AssignmentRecord, DeskError, DeskResult, Message, Role, Ticket,
    TicketStatus, User,
};

use super::{
    apply_reassignment, AssigneeFilter, MessageStore, TicketFilter, TicketMutation, TicketStore,
    UserDirectory,
};

const USER_COLUMNS: &str = "id, email, first_name, last_name, role, active, created_at";
const TICKET_COLUMNS: &str = "id, title, description, status, priority, customer_id, \
                              assigned_agent_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, ticket_id, sender_id, message_type, content, created_at";

/// Store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: Uuid) -> DeskResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> DeskResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn users_by_role(&self, role: Role) -> DeskResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY seq",
            USER_COLUMNS
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn active_agents(&self) -> DeskResult<Vec<User>> {
        let agents = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE role = $1 AND active = TRUE ORDER BY seq",
            USER_COLUMNS
        ))
        .bind(Role::Agent)
        .fetch_all(&self.pool)
        .await?;
        Ok(agents)
    }

    async fn insert_user(&self, user: &User) -> DeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, role, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(user.active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DeskResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET active = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DeskError::not_found("user", id))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> DeskResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET first_name = $2, last_name = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DeskError::not_found("user", id))
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> DeskResult<()> {
        self.insert_assigned_ticket(ticket, None).await
    }

    async fn insert_assigned_ticket(
        &self,
        ticket: &Ticket,
        record: Option<&AssignmentRecord>,
    ) -> DeskResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tickets (id, title, description, status, priority, customer_id,
                                 assigned_agent_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(ticket.id)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.status)
        .bind(ticket.priority)
        .bind(ticket.customer_id)
        .bind(ticket.assigned_agent_id)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(record) = record {
            insert_history(&mut *tx, record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn update_ticket(&self, id: Uuid, mutation: TicketMutation) -> DeskResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        let mut ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1 FOR UPDATE",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DeskError::not_found("ticket", id))?;

        // Dropping the transaction on error rolls back and releases the row lock
        mutation(&mut ticket)?;

        sqlx::query(
            r#"
            UPDATE tickets
            SET title = $2, description = $3, status = $4, priority = $5,
                assigned_agent_id = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(ticket.id)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.status)
        .bind(ticket.priority)
        .bind(ticket.assigned_agent_id)
        .bind(ticket.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ticket)
    }

    async fn query_tickets(&self, filter: &TicketFilter) -> DeskResult<Vec<Ticket>> {
        let (agent_id, unassigned_only) = match filter.assignee {
            AssigneeFilter::Any => (None, false),
            AssigneeFilter::Unassigned => (None, true),
            AssigneeFilter::Agent(agent_id) => (Some(agent_id), false),
        };

        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            SELECT {} FROM tickets
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR assigned_agent_id = $2)
              AND ($3 = FALSE OR assigned_agent_id IS NULL)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::text IS NULL OR priority = $5)
            ORDER BY seq
            "#,
            TICKET_COLUMNS
        ))
        .bind(filter.customer_id)
        .bind(agent_id)
        .bind(unassigned_only)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn count_assigned(&self, agent_id: Uuid, statuses: &[TicketStatus]) -> DeskResult<u64> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE assigned_agent_id = $1 AND status = ANY($2)",
        )
        .bind(agent_id)
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn reassign_ticket(
        &self,
        id: Uuid,
        agent_id: Option<Uuid>,
        reason: AssignmentReason,
    ) -> DeskResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        let mut ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1 FOR UPDATE",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DeskError::not_found("ticket", id))?;

        let record = apply_reassignment(&mut ticket, agent_id, reason);

        sqlx::query("UPDATE tickets SET assigned_agent_id = $2, updated_at = $3 WHERE id = $1")
            .bind(ticket.id)
            .bind(ticket.assigned_agent_id)
            .bind(ticket.updated_at)
            .execute(&mut *tx)
            .await?;

        if let Some(record) = &record {
            insert_history(&mut *tx, record).await?;
        }

        tx.commit().await?;
        Ok(ticket)
    }

    async fn assignment_history(&self, ticket_id: Uuid) -> DeskResult<Vec<AssignmentRecord>> {
        let history = sqlx::query_as::<_, AssignmentRecord>(
            r#"
            SELECT id, ticket_id, assigned_from, assigned_to, reason, assigned_at
            FROM ticket_assignment_history
            WHERE ticket_id = $1
            ORDER BY seq
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }
}

async fn insert_history(conn: &mut PgConnection, record: &AssignmentRecord) -> DeskResult<()> {
    sqlx::query(
        r#"
        INSERT INTO ticket_assignment_history
            (id, ticket_id, assigned_from, assigned_to, reason, assigned_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(record.id)
    .bind(record.ticket_id)
    .bind(record.assigned_from)
    .bind(record.assigned_to)
    .bind(record.reason)
    .bind(record.assigned_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_message(&self, message: &Message) -> DeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, ticket_id, sender_id, message_type, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.ticket_id)
        .bind(message.sender_id)
        .bind(message.message_type)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> DeskResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn delete_message(&self, id: Uuid) -> DeskResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn messages_for_ticket(&self, ticket_id: Uuid) -> DeskResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM messages WHERE ticket_id = $1 ORDER BY seq",
            MESSAGE_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn messages_by_sender(&self, sender_id: Uuid) -> DeskResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM messages WHERE sender_id = $1 ORDER BY seq",
            MESSAGE_COLUMNS
        ))
        .bind(sender_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }
}
