//! Server dependencies for the login flow (using traits for testability)
//!
//! This module provides the central dependency container used by the session
//! manager, plus the adapters that plug the gateway and bot clients into the
//! infrastructure traits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use login_gateway::{BotService, GatewayError, GatewayService};
use std::sync::Arc;
use tracing::{debug, info};

use crate::common::{AccessPolicy, UserId};
use crate::domains::auth::LoginFailure;
use crate::kernel::{BaseLoginTransport, BaseNotifier, BaseSessionStore, TransportHandle};

// =============================================================================
// GatewayService Adapter (implements BaseLoginTransport trait)
// =============================================================================

/// Wrapper around GatewayService that implements BaseLoginTransport
pub struct GatewayTransport(pub Arc<GatewayService>);

impl GatewayTransport {
    pub fn new(service: Arc<GatewayService>) -> Self {
        Self(service)
    }
}

/// Map a platform RPC error name onto the login failure it means.
pub fn classify_rpc_code(code: &str) -> Option<LoginFailure> {
    let failure = match code {
        "PHONE_NUMBER_INVALID"
        | "PHONE_NUMBER_UNOCCUPIED"
        | "PHONE_NUMBER_APP_SIGNUP_FORBIDDEN" => LoginFailure::InvalidPhoneNumber,
        "PHONE_NUMBER_BANNED" | "PHONE_NUMBER_FLOOD" | "USER_DEACTIVATED_BAN" => {
            LoginFailure::BannedNumber
        }
        "PHONE_CODE_INVALID" | "PHONE_CODE_EMPTY" => LoginFailure::InvalidCode,
        "PHONE_CODE_EXPIRED" => LoginFailure::ExpiredCode,
        "SESSION_PASSWORD_NEEDED" => LoginFailure::PasswordRequired,
        "PASSWORD_HASH_INVALID" => LoginFailure::InvalidPassword,
        other => {
            let seconds = other
                .strip_prefix("FLOOD_WAIT_")
                .or_else(|| other.strip_prefix("FLOOD_PREMIUM_WAIT_"))?;
            LoginFailure::RateLimited {
                retry_after_secs: seconds.parse().ok()?,
            }
        }
    };
    Some(failure)
}

/// Translate any gateway error into the closed set of login failures.
pub fn classify_gateway_error(err: &GatewayError) -> LoginFailure {
    err.rpc_code()
        .and_then(classify_rpc_code)
        .unwrap_or_else(|| LoginFailure::transport(err.to_string()))
}

#[async_trait]
impl BaseLoginTransport for GatewayTransport {
    async fn connect(&self) -> Result<TransportHandle, LoginFailure> {
        self.0
            .connect()
            .await
            .map(TransportHandle::new)
            .map_err(|e| classify_gateway_error(&e))
    }

    async fn request_code(
        &self,
        handle: &mut TransportHandle,
        phone_number: &str,
    ) -> Result<(), LoginFailure> {
        let sent = self
            .0
            .send_code(&handle.id, phone_number)
            .await
            .map_err(|e| classify_gateway_error(&e))?;
        debug!(
            connection = %handle.id,
            delivery = sent.delivery.as_deref().unwrap_or("unknown"),
            resend_after_secs = ?sent.timeout,
            "Platform sent login code"
        );
        handle.code_token = Some(sent.phone_code_hash);
        Ok(())
    }

    async fn submit_code(
        &self,
        handle: &mut TransportHandle,
        phone_number: &str,
        code: &str,
    ) -> Result<(), LoginFailure> {
        let code_token = handle
            .code_token
            .as_deref()
            .ok_or_else(|| {
                LoginFailure::transport("no login code was requested on this connection")
            })?;
        let auth = self
            .0
            .sign_in(&handle.id, phone_number, code_token, code)
            .await
            .map_err(|e| classify_gateway_error(&e))?;
        info!(
            connection = %handle.id,
            account = auth.user_id,
            username = auth.username.as_deref().unwrap_or("-"),
            "Platform accepted login code"
        );
        Ok(())
    }

    async fn submit_password(
        &self,
        handle: &mut TransportHandle,
        password: &str,
    ) -> Result<(), LoginFailure> {
        let auth = self
            .0
            .check_password(&handle.id, password)
            .await
            .map_err(|e| classify_gateway_error(&e))?;
        info!(
            connection = %handle.id,
            account = auth.user_id,
            username = auth.username.as_deref().unwrap_or("-"),
            "Platform accepted password"
        );
        Ok(())
    }

    async fn export_session(&self, handle: &TransportHandle) -> Result<String, LoginFailure> {
        self.0
            .export_session(&handle.id)
            .await
            .map_err(|e| classify_gateway_error(&e))
    }

    async fn relax_security(
        &self,
        handle: &TransportHandle,
        password: Option<&str>,
    ) -> Result<(), LoginFailure> {
        let Some(password) = password else {
            debug!(connection = %handle.id, "Account has no second factor to remove");
            return Ok(());
        };
        self.0
            .remove_password(&handle.id, password)
            .await
            .map_err(|e| classify_gateway_error(&e))
    }

    async fn reconnect(&self, session_string: &str) -> Result<TransportHandle, LoginFailure> {
        self.0
            .reconnect(session_string)
            .await
            .map(TransportHandle::new)
            .map_err(|e| classify_gateway_error(&e))
    }

    async fn account_phone(&self, handle: &TransportHandle) -> Result<String, LoginFailure> {
        let me = self
            .0
            .get_me(&handle.id)
            .await
            .map_err(|e| classify_gateway_error(&e))?;
        debug!(
            connection = %handle.id,
            account = me.user_id,
            username = me.username.as_deref().unwrap_or("-"),
            "Restored session identified"
        );
        me.phone_number
            .ok_or_else(|| LoginFailure::transport("account has no phone number"))
    }

    async fn await_login_code(&self, handle: &TransportHandle) -> Result<String, LoginFailure> {
        self.0
            .wait_login_code(&handle.id)
            .await
            .map_err(|e| classify_gateway_error(&e))
    }

    async fn disconnect(&self, handle: TransportHandle) -> Result<()> {
        self.0
            .disconnect(&handle.id)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// Notifiers (implement BaseNotifier trait)
// =============================================================================

/// Sends notifications as bot messages to the user's private chat.
pub struct BotNotifier(pub Arc<BotService>);

impl BotNotifier {
    pub fn new(service: Arc<BotService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseNotifier for BotNotifier {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()> {
        self.0
            .send_message(user_id.get(), text)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

/// Writes notifications to the log. Used when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl BaseNotifier for LogNotifier {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()> {
        info!(%user_id, text, "Notification");
        Ok(())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Tunables of the login flow.
#[derive(Debug, Clone, Copy)]
pub struct LoginSettings {
    /// Invalid codes allowed before the attempt fails.
    pub max_retries: u32,
    /// Idle time after which an attempt is cancelled.
    pub login_timeout: Duration,
    /// Remove the second factor after a successful login.
    pub auto_remove_2fa: bool,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            login_timeout: Duration::seconds(300),
            auto_remove_2fa: true,
        }
    }
}

/// Server dependencies accessible to the session manager
#[derive(Clone)]
pub struct ServerDeps {
    pub transport: Arc<dyn BaseLoginTransport>,
    pub notifier: Arc<dyn BaseNotifier>,
    pub sessions: Arc<dyn BaseSessionStore>,
    pub access: AccessPolicy,
    pub login: LoginSettings,
}

impl ServerDeps {
    pub fn new(
        transport: Arc<dyn BaseLoginTransport>,
        notifier: Arc<dyn BaseNotifier>,
        sessions: Arc<dyn BaseSessionStore>,
        access: AccessPolicy,
        login: LoginSettings,
    ) -> Self {
        Self {
            transport,
            notifier,
            sessions,
            access,
            login,
        }
    }
}
