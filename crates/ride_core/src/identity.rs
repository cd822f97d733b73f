//! Identity registry: who a user is, what role they hold, whether they are active.
//!
//! The core only reads from the registry. [`InMemoryIdentityRegistry`] also
//! carries the registration rules used by the demo, tests and experiments;
//! a production deployment puts its user database behind [`IdentityRegistry`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::error::{EntityRef, RideError};
use crate::model::{Role, User, UserId};

pub trait IdentityRegistry: Send + Sync {
    fn get_role(&self, user_id: UserId) -> Result<Role, RideError>;

    /// Unknown users are reported as inactive.
    fn is_active(&self, user_id: UserId) -> bool;

    /// Every Driver-role user, active or not.
    fn drivers(&self) -> Vec<UserId>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("email cannot be empty")]
    EmptyEmail,
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
    #[error("email `{0}` is already in use")]
    DuplicateEmail(String),
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityRegistry {
    users: RwLock<HashMap<UserId, User>>,
    next_id: AtomicU64,
}

impl InMemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user. Username and email are trimmed; both must be
    /// non-empty and unique.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        role: Role,
    ) -> Result<User, RegistrationError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(RegistrationError::EmptyUsername);
        }
        if email.is_empty() {
            return Err(RegistrationError::EmptyEmail);
        }

        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.values().any(|user| user.username == username) {
            return Err(RegistrationError::DuplicateUsername(username.to_string()));
        }
        if users.values().any(|user| user.email.eq_ignore_ascii_case(email)) {
            return Err(RegistrationError::DuplicateEmail(email.to_string()));
        }

        let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let user = User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            role,
            active: true,
        };
        users.insert(id, user.clone());
        tracing::debug!(user = %id, %role, "user registered");
        Ok(user)
    }

    pub fn set_active(&self, user_id: UserId, active: bool) -> Result<(), RideError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let user = users
            .get_mut(&user_id)
            .ok_or(RideError::NotFound(EntityRef::User(user_id)))?;
        user.active = active;
        Ok(())
    }

    pub fn get_user(&self, user_id: UserId) -> Result<User, RideError> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
            .ok_or(RideError::NotFound(EntityRef::User(user_id)))
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityRegistry for InMemoryIdentityRegistry {
    fn get_role(&self, user_id: UserId) -> Result<Role, RideError> {
        self.get_user(user_id).map(|user| user.role)
    }

    fn is_active(&self, user_id: UserId) -> bool {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .is_some_and(|user| user.active)
    }

    fn drivers(&self) -> Vec<UserId> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let mut drivers: Vec<UserId> = users
            .values()
            .filter(|user| user.role == Role::Driver)
            .map(|user| user.id)
            .collect();
        drivers.sort_unstable();
        drivers
    }
}
