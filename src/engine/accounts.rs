use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::normalize_email;
use super::{Engine, EngineError};

/// Every stored account plus its unique lookups.
#[derive(Debug, Default)]
pub struct AccountBook {
    users: HashMap<UserId, User>,
    /// Normalized email → user.
    by_email: HashMap<String, UserId>,
    /// Reset token hash → user.
    by_reset_token: HashMap<String, UserId>,
}

impl AccountBook {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn customer(&self, id: &UserId) -> Option<&User> {
        self.users.get(id).filter(|u| u.role == Role::Customer)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.by_email
            .get(&normalize_email(email))
            .and_then(|id| self.users.get(id))
    }

    pub fn find_by_reset_token(&self, token_hash: &str) -> Option<&User> {
        self.by_reset_token
            .get(token_hash)
            .and_then(|id| self.users.get(id))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    fn forget_token(&mut self, id: &UserId) {
        if let Some(user) = self.users.get_mut(id)
            && let Some(hash) = user.reset_token_hash.take()
        {
            self.by_reset_token.remove(&hash);
            user.reset_token_expiry = None;
        }
    }

    pub(super) fn apply(&mut self, event: &Event) {
        match event {
            Event::UserRegistered { user } => {
                self.by_email.insert(user.email.clone(), user.id);
                if let Some(ref hash) = user.reset_token_hash {
                    self.by_reset_token.insert(hash.clone(), user.id);
                }
                self.users.insert(user.id, user.clone());
            }
            Event::UserUpdated {
                id,
                email,
                first_name,
                last_name,
            } => {
                if let Some(user) = self.users.get_mut(id) {
                    if user.email != *email {
                        self.by_email.remove(&user.email);
                        self.by_email.insert(email.clone(), *id);
                    }
                    user.email = email.clone();
                    user.first_name = first_name.clone();
                    user.last_name = last_name.clone();
                }
            }
            Event::UserDeleted { id } => {
                self.forget_token(id);
                if let Some(user) = self.users.remove(id) {
                    self.by_email.remove(&user.email);
                }
            }
            Event::PasswordChanged { id, password_hash } => {
                self.forget_token(id);
                if let Some(user) = self.users.get_mut(id) {
                    user.password_hash = password_hash.clone();
                }
            }
            Event::ResetTokenIssued {
                id,
                token_hash,
                expires_at,
            } => {
                self.forget_token(id);
                if let Some(user) = self.users.get_mut(id) {
                    user.reset_token_hash = Some(token_hash.clone());
                    user.reset_token_expiry = Some(*expires_at);
                    self.by_reset_token.insert(token_hash.clone(), *id);
                }
            }
            _ => {}
        }
    }
}

/// A self-registration. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct CustomerUpdate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

fn validate_person(email: &str, first_name: &str, last_name: &str) -> Result<(), EngineError> {
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::Invalid("email is not valid"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(EngineError::Invalid("first and last name are required"));
    }
    if first_name.len() > MAX_NAME_LEN || last_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

impl Engine {
    /// Register a customer account. Emails are unique after normalization.
    pub async fn register(&self, req: NewAccount) -> Result<User, EngineError> {
        let email = normalize_email(&req.email);
        validate_person(&email, &req.first_name, &req.last_name)?;

        let _gate = self.commit_gate.read().await;
        let mut accounts = self.accounts.write().await;
        if accounts.find_by_email(&email).is_some() {
            return Err(EngineError::EmailTaken);
        }
        let user = User {
            id: Ulid::new(),
            email,
            password_hash: req.password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role: Role::Customer,
            reset_token_hash: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        };
        let event = Event::UserRegistered { user: user.clone() };
        self.persist_and_apply_account(&mut accounts, &event).await?;
        tracing::info!(user_id = %user.id, "customer registered");
        Ok(user)
    }

    /// The stored account for a login attempt, if any.
    pub async fn find_account(&self, email: &str) -> Option<User> {
        self.accounts.read().await.find_by_email(email).cloned()
    }

    pub async fn user(&self, id: &UserId) -> Option<User> {
        self.accounts.read().await.get(id).cloned()
    }

    /// Record a reset token for `email`. Returns `None` when no account
    /// matches; callers must not reveal the difference.
    pub async fn issue_reset_token(
        &self,
        email: &str,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<User>, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut accounts = self.accounts.write().await;
        let Some(id) = accounts.find_by_email(email).map(|u| u.id) else {
            return Ok(None);
        };
        let event = Event::ResetTokenIssued {
            id,
            token_hash,
            expires_at,
        };
        self.persist_and_apply_account(&mut accounts, &event).await?;
        Ok(accounts.get(&id).cloned())
    }

    /// Redeem a reset token. Tokens are single-use and checked for expiry at
    /// redemption time.
    pub async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<UserId, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut accounts = self.accounts.write().await;
        let user = accounts
            .find_by_reset_token(token_hash)
            .ok_or(EngineError::InvalidResetToken)?;
        if user.reset_token_expiry.is_none_or(|expiry| expiry <= now) {
            return Err(EngineError::ExpiredResetToken);
        }
        let id = user.id;
        let event = Event::PasswordChanged { id, password_hash };
        self.persist_and_apply_account(&mut accounts, &event).await?;
        tracing::info!(user_id = %id, "password reset");
        Ok(id)
    }

    /// Customers, newest first.
    pub async fn list_customers(&self) -> Vec<User> {
        let accounts = self.accounts.read().await;
        let mut customers: Vec<User> = accounts
            .users()
            .filter(|u| u.role == Role::Customer)
            .cloned()
            .collect();
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        customers
    }

    pub async fn get_customer(&self, id: &UserId) -> Result<User, EngineError> {
        self.accounts
            .read()
            .await
            .customer(id)
            .cloned()
            .ok_or(EngineError::NotFound("customer"))
    }

    pub async fn update_customer(&self, id: UserId, req: CustomerUpdate) -> Result<User, EngineError> {
        let email = normalize_email(&req.email);
        validate_person(&email, &req.first_name, &req.last_name)?;

        let _gate = self.commit_gate.read().await;
        let mut accounts = self.accounts.write().await;
        if accounts.customer(&id).is_none() {
            return Err(EngineError::NotFound("customer"));
        }
        if accounts.find_by_email(&email).is_some_and(|other| other.id != id) {
            return Err(EngineError::EmailTaken);
        }
        let event = Event::UserUpdated {
            id,
            email,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
        };
        self.persist_and_apply_account(&mut accounts, &event).await?;
        accounts.get(&id).cloned().ok_or(EngineError::NotFound("customer"))
    }

    /// Refused while the customer holds confirmed bookings. Cancelled
    /// bookings stay behind without customer details.
    pub async fn delete_customer(&self, id: UserId) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut accounts = self.accounts.write().await;
        if accounts.customer(&id).is_none() {
            return Err(EngineError::NotFound("customer"));
        }
        if self.has_confirmed_bookings(&id).await {
            return Err(EngineError::InUse("customer"));
        }
        let event = Event::UserDeleted { id };
        self.persist_and_apply_account(&mut accounts, &event).await?;
        tracing::info!(user_id = %id, "customer deleted");
        Ok(())
    }

    /// Caller holds the accounts lock, so no new booking for `id` can start.
    async fn has_confirmed_bookings(&self, id: &UserId) -> bool {
        let ids = self
            .index
            .user_bookings
            .get(id)
            .map(|v| v.clone())
            .unwrap_or_default();
        for booking_id in ids {
            let Some(rs) = self
                .room_for_entity(&booking_id)
                .and_then(|rid| self.get_room_state(&rid))
            else {
                continue;
            };
            let guard = rs.read().await;
            if guard
                .intervals
                .get(booking_id)
                .is_some_and(|i| i.is_blocking())
            {
                return true;
            }
        }
        false
    }
}
