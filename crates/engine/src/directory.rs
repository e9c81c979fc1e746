//! Agent directory
//!
//! Lookup of users and the active agent roster. Directory order is
//! registration order and is the assignment tie-break.

use std::sync::Arc;

use uuid::Uuid;

use helpdesk_shared::{DeskError, DeskResult, Role, User};

use crate::store::UserDirectory;

/// Users and agent eligibility
#[derive(Clone)]
pub struct AgentDirectory {
    users: Arc<dyn UserDirectory>,
}

impl AgentDirectory {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Active agents in registration order
    pub async fn active_agents(&self) -> DeskResult<Vec<User>> {
        self.users.active_agents().await
    }

    /// Look up a user, failing with NotFound when absent
    pub async fn resolve(&self, user_id: Uuid) -> DeskResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| DeskError::not_found("user", user_id))
    }

    pub async fn find_by_email(&self, email: &str) -> DeskResult<Option<User>> {
        self.users.find_by_email(email.trim()).await
    }

    pub async fn users_by_role(&self, role: Role) -> DeskResult<Vec<User>> {
        self.users.users_by_role(role).await
    }

    /// Register a new, active user
    pub async fn register(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> DeskResult<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DeskError::Validation(format!(
                "Invalid email address: {:?}",
                email
            )));
        }
        if self.users.find_by_email(email).await?.is_some() {
            tracing::warn!(email = %email, "Registration rejected: email already in use");
            return Err(DeskError::Validation(format!(
                "User with email {} already exists",
                email
            )));
        }

        let user = User::new(email, first_name.trim(), last_name.trim(), role);
        self.users.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, role = %role, "User registered");
        Ok(user)
    }

    /// Make a user eligible for new assignments again
    pub async fn activate(&self, user_id: Uuid) -> DeskResult<User> {
        let user = self.users.set_active(user_id, true).await?;
        tracing::info!(user_id = %user_id, "User activated");
        Ok(user)
    }

    /// Stop new assignments to a user; tickets already assigned stay put
    pub async fn deactivate(&self, user_id: Uuid) -> DeskResult<User> {
        let user = self.users.set_active(user_id, false).await?;
        tracing::info!(user_id = %user_id, "User deactivated");
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> DeskResult<User> {
        self.users
            .update_profile(user_id, first_name.trim(), last_name.trim())
            .await
    }
}
