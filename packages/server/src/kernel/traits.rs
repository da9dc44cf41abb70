// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The login state machine talks to the platform, the user and the session
// storage exclusively through them.
//
// Naming convention: Base* for trait names (e.g., BaseLoginTransport, BaseNotifier)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::UserId;
use crate::domains::auth::LoginFailure;
use crate::domains::sessions::models::{NewSession, StoredSession};

// =============================================================================
// Login Transport Trait (Infrastructure - platform login steps)
// =============================================================================

/// Opaque handle to a connected but not yet authorized platform session.
///
/// `code_token` is whatever the platform returned with the sent code and must
/// be presented again when the code is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHandle {
    pub id: String,
    pub code_token: Option<String>,
}

impl TransportHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code_token: None,
        }
    }
}

#[async_trait]
pub trait BaseLoginTransport: Send + Sync {
    /// Open a new unauthorized connection.
    async fn connect(&self) -> Result<TransportHandle, LoginFailure>;

    /// Ask the platform to send a login code to the phone.
    async fn request_code(
        &self,
        handle: &mut TransportHandle,
        phone_number: &str,
    ) -> Result<(), LoginFailure>;

    /// Submit the login code. `Err(LoginFailure::PasswordRequired)` means the
    /// code was right but the account has a second factor.
    async fn submit_code(
        &self,
        handle: &mut TransportHandle,
        phone_number: &str,
        code: &str,
    ) -> Result<(), LoginFailure>;

    async fn submit_password(
        &self,
        handle: &mut TransportHandle,
        password: &str,
    ) -> Result<(), LoginFailure>;

    /// Export an authorized connection as a session string that can be
    /// persisted and used to reconnect later.
    async fn export_session(&self, handle: &TransportHandle) -> Result<String, LoginFailure>;

    /// Drop the account's second factor (needs the current password when the
    /// account has one). Best-effort: callers never fail a login on it.
    async fn relax_security(
        &self,
        handle: &TransportHandle,
        password: Option<&str>,
    ) -> Result<(), LoginFailure>;

    /// Open a connection that is already authorized by an exported session.
    async fn reconnect(&self, session_string: &str) -> Result<TransportHandle, LoginFailure>;

    /// Phone number of the account an authorized connection belongs to.
    async fn account_phone(&self, handle: &TransportHandle) -> Result<String, LoginFailure>;

    /// Wait until the platform delivers a login code to an authorized
    /// connection. May never return; callers bound it with a timeout.
    async fn await_login_code(&self, handle: &TransportHandle) -> Result<String, LoginFailure>;

    /// Close the connection. Must be idempotent and safe on any handle.
    async fn disconnect(&self, handle: TransportHandle) -> Result<()>;
}

// =============================================================================
// Notifier Trait (Infrastructure - text to a user)
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()>;
}

// =============================================================================
// Session Store Trait (Infrastructure - durable sessions)
// =============================================================================

#[async_trait]
pub trait BaseSessionStore: Send + Sync {
    /// Persist a session, replacing an existing one for the same owner and phone.
    async fn save(&self, session: NewSession) -> Result<StoredSession>;

    /// List sessions, optionally only those owned by `owner`.
    async fn list(&self, owner: Option<UserId>) -> Result<Vec<StoredSession>>;

    async fn get(&self, id: &str) -> Result<Option<StoredSession>>;
}
