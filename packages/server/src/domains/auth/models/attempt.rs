use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::validation::{Password, PhoneNumber};
use crate::common::{mask_phone, UserId};
use crate::domains::auth::connection::LoginConnection;
use crate::domains::auth::types::LoginState;

/// One in-flight login attempt.
///
/// Only the registry hands out access to an attempt, and only the login
/// machine changes its state.
#[derive(Debug)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: UserId,
    pub phone_number: PhoneNumber,
    pub created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    state: LoginState,
    trail: Vec<LoginState>,
    retry_count: u32,
    connection: Option<LoginConnection>,
    /// Accepted second-factor password, kept only until the attempt ends so
    /// the post-login security step can use it.
    password: Option<Password>,
}

impl Attempt {
    pub fn new(user_id: UserId, phone_number: PhoneNumber, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            phone_number,
            created_at: now,
            last_activity_at: now,
            state: LoginState::AwaitingPhone,
            trail: vec![LoginState::AwaitingPhone],
            retry_count: 0,
            connection: None,
            password: None,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    /// Every state this attempt has entered, in order.
    pub fn trail(&self) -> &[LoginState] {
        &self.trail
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub(crate) fn set_state(&mut self, next: LoginState) {
        debug_assert!(
            next.rank() >= self.state.rank(),
            "login state went backwards: {} -> {}",
            self.state,
            next
        );
        self.state = next.clone();
        self.trail.push(next);
    }

    pub(crate) fn record_invalid_code(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        !self.state.is_terminal() && now - self.last_activity_at >= timeout
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn attach_connection(&mut self, connection: LoginConnection) {
        self.connection = Some(connection);
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut LoginConnection> {
        self.connection.as_mut()
    }

    pub(crate) fn take_connection(&mut self) -> Option<LoginConnection> {
        self.connection.take()
    }

    pub(crate) fn remember_password(&mut self, password: Password) {
        self.password = Some(password);
    }

    pub(crate) fn take_password(&mut self) -> Option<Password> {
        self.password.take()
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot {
            attempt_id: self.id,
            user_id: self.user_id,
            phone_number: mask_phone(self.phone_number.as_str()),
            state: self.state.clone(),
            retry_count: self.retry_count,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Read-only copy of an attempt for callers outside the registry.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSnapshot {
    pub attempt_id: Uuid,
    pub user_id: UserId,
    pub phone_number: String,
    pub state: LoginState,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}
