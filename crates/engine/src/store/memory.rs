//! In-memory store
//!
//! Records live in insertion-ordered arenas with an id -> slot index, so
//! listing order is creation order and lookups stay O(1). One lock per
//! record kind; `update_ticket` runs its mutation under the ticket write
//! lock, which serializes concurrent writers per ticket.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use helpdesk_shared::{
    AssignmentReason, AssignmentRecord, DeskError, DeskResult, Message, Role, Ticket,
    TicketStatus, User,
};

use super::{
    apply_reassignment, MessageStore, TicketFilter, TicketMutation, TicketStore, UserDirectory,
};

/// Arenas smaller than this are never compacted
const COMPACT_MIN_SLOTS: usize = 32;

/// Insertion-ordered records addressable by id
///
/// Removal leaves a vacant slot so indices of later records stay valid.
/// Once vacant slots outnumber live ones the arena is compacted, so its
/// size stays within twice the live count.
struct Arena<T> {
    slots: Vec<Option<T>>,
    index: HashMap<Uuid, usize>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn contains(&self, id: &Uuid) -> bool {
        self.index.contains_key(id)
    }

    fn insert(&mut self, id: Uuid, record: T) {
        self.index.insert(id, self.slots.len());
        self.slots.push(Some(record));
    }

    fn get(&self, id: &Uuid) -> Option<&T> {
        self.index
            .get(id)
            .and_then(|&slot| self.slots.get(slot))
            .and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: &Uuid) -> Option<&mut T> {
        let slot = *self.index.get(id)?;
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn remove(&mut self, id: &Uuid) -> Option<T> {
        let slot = self.index.remove(id)?;
        let record = self.slots.get_mut(slot).and_then(Option::take);
        if self.slots.len() >= COMPACT_MIN_SLOTS && self.index.len() * 2 < self.slots.len() {
            self.compact();
        }
        record
    }

    /// Drop vacant slots and rebuild the index in insertion order
    fn compact(&mut self) {
        let mut live: Vec<(usize, Uuid)> =
            self.index.iter().map(|(id, &slot)| (slot, *id)).collect();
        live.sort_unstable_by_key(|&(slot, _)| slot);

        let mut slots = Vec::with_capacity(live.len());
        let mut index = HashMap::with_capacity(live.len());
        for (old_slot, id) in live {
            if let Some(record) = self.slots.get_mut(old_slot).and_then(Option::take) {
                index.insert(id, slots.len());
                slots.push(Some(record));
            }
        }
        self.slots = slots;
        self.index = index;
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }
}

/// In-memory implementation of every store trait
pub struct MemoryStore {
    users: RwLock<Arena<User>>,
    tickets: RwLock<Arena<Ticket>>,
    messages: RwLock<Arena<Message>>,
    history: RwLock<Vec<AssignmentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Arena::new()),
            tickets: RwLock::new(Arena::new()),
            messages: RwLock::new(Arena::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    pub async fn ticket_count(&self) -> usize {
        self.tickets.read().await.index.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: Uuid) -> DeskResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DeskResult<Option<User>> {
        let users = self.users.read().await;
        let found = users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned();
        Ok(found)
    }

    async fn users_by_role(&self, role: Role) -> DeskResult<Vec<User>> {
        let users = self.users.read().await;
        let matching = users.iter().filter(|u| u.role == role).cloned().collect();
        Ok(matching)
    }

    async fn active_agents(&self) -> DeskResult<Vec<User>> {
        let users = self.users.read().await;
        let agents = users.iter().filter(|u| u.is_assignable()).cloned().collect();
        Ok(agents)
    }

    async fn insert_user(&self, user: &User) -> DeskResult<()> {
        let mut users = self.users.write().await;
        if users.contains(&user.id) {
            return Err(DeskError::Validation(format!(
                "User {} already exists",
                user.id
            )));
        }
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DeskError::Validation(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DeskResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| DeskError::not_found("user", id))?;
        user.active = active;
        Ok(user.clone())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> DeskResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| DeskError::not_found("user", id))?;
        user.first_name = first_name.to_string();
        user.last_name = last_name.to_string();
        Ok(user.clone())
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> DeskResult<()> {
        self.insert_assigned_ticket(ticket, None).await
    }

    async fn insert_assigned_ticket(
        &self,
        ticket: &Ticket,
        record: Option<&AssignmentRecord>,
    ) -> DeskResult<()> {
        // Lock order is tickets, then history
        let mut tickets = self.tickets.write().await;
        let mut history = self.history.write().await;
        if tickets.contains(&ticket.id) {
            return Err(DeskError::Validation(format!(
                "Ticket {} already exists",
                ticket.id
            )));
        }
        tickets.insert(ticket.id, ticket.clone());
        if let Some(record) = record {
            history.push(record.clone());
        }
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> DeskResult<Option<Ticket>> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn update_ticket(&self, id: Uuid, mutation: TicketMutation) -> DeskResult<Ticket> {
        let mut tickets = self.tickets.write().await;
        let stored = tickets
            .get_mut(&id)
            .ok_or_else(|| DeskError::not_found("ticket", id))?;

        // Mutate a copy so a failed mutation leaves the stored ticket untouched
        let mut draft = stored.clone();
        mutation(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }

    async fn query_tickets(&self, filter: &TicketFilter) -> DeskResult<Vec<Ticket>> {
        let tickets = self.tickets.read().await;
        let matching = tickets.iter().filter(|t| filter.matches(t)).cloned().collect();
        Ok(matching)
    }

    async fn count_assigned(&self, agent_id: Uuid, statuses: &[TicketStatus]) -> DeskResult<u64> {
        let tickets = self.tickets.read().await;
        let count = tickets
            .iter()
            .filter(|t| t.assigned_agent_id == Some(agent_id) && statuses.contains(&t.status))
            .count();
        Ok(count as u64)
    }

    async fn reassign_ticket(
        &self,
        id: Uuid,
        agent_id: Option<Uuid>,
        reason: AssignmentReason,
    ) -> DeskResult<Ticket> {
        let mut tickets = self.tickets.write().await;
        let mut history = self.history.write().await;
        let stored = tickets
            .get_mut(&id)
            .ok_or_else(|| DeskError::not_found("ticket", id))?;

        let mut draft = stored.clone();
        if let Some(record) = apply_reassignment(&mut draft, agent_id, reason) {
            history.push(record);
        }
        *stored = draft.clone();
        Ok(draft)
    }

    async fn assignment_history(&self, ticket_id: Uuid) -> DeskResult<Vec<AssignmentRecord>> {
        let history = self.history.read().await;
        let rows = history
            .iter()
            .filter(|r| r.ticket_id == ticket_id)
            .cloned()
            .collect();
        Ok(rows)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &Message) -> DeskResult<()> {
        let mut messages = self.messages.write().await;
        if messages.contains(&message.id) {
            return Err(DeskError::Validation(format!(
                "Message {} already exists",
                message.id
            )));
        }
        messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> DeskResult<Option<Message>> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn delete_message(&self, id: Uuid) -> DeskResult<bool> {
        Ok(self.messages.write().await.remove(&id).is_some())
    }

    async fn messages_for_ticket(&self, ticket_id: Uuid) -> DeskResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let thread = messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        Ok(thread)
    }

    async fn messages_by_sender(&self, sender_id: Uuid) -> DeskResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let authored = messages
            .iter()
            .filter(|m| m.sender_id == sender_id)
            .cloned()
            .collect();
        Ok(authored)
    }
}
