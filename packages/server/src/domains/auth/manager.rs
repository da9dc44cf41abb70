//! Session manager - the single entry point for inbound login commands.
//!
//! Every public command checks access, validates its input, runs against the
//! user's attempt under the registry lease, and sends the user exactly one
//! notification about what happened (unknown users get none).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::actions::{advance, relay_login_code, Advanced, CodeRelay};
use super::classify::{classify, Inbound};
use super::effects::LoginEffect;
use super::errors::{LoginError, ValidationError};
use super::events::LoginEvent;
use super::machines::{LoginMachine, Step};
use super::models::{AttemptSnapshot, LoginCode, Password, PhoneNumber};
use super::registry::{AttemptLease, AttemptRegistry};
use super::types::{CancelReason, LoginFailure};
use crate::common::{mask_phone, UserId};
use crate::domains::sessions::models::{NewSession, SessionSource, SessionSummary};
use crate::kernel::ServerDeps;

const HELP_TEXT: &str = "Send /login <phone number> to log an account in, \
then the code you receive.\n\
/sessions lists your saved sessions, /add <session string> imports one, /cancel stops a login.\n\
/otp <session id> fetches a fresh login code for a saved session (owner only).";

/// What an inbound command achieved.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    CodeSent { attempt: AttemptSnapshot },
    CodeRejected { remaining_attempts: u32 },
    PasswordRequired,
    Completed {
        session: SessionSummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Failed { failure: LoginFailure },
    Cancelled { reason: CancelReason },
    SessionImported { session: SessionSummary },
    Sessions { sessions: Vec<SessionSummary> },
    CodeRelayed {
        session_id: String,
        phone_number: String,
        code: String,
    },
    RelayFailed {
        session_id: String,
        failure: LoginFailure,
    },
    RelayTimedOut { session_id: String },
    Help,
}

impl LoginOutcome {
    /// The notification text for this outcome.
    pub fn message(&self) -> String {
        match self {
            LoginOutcome::CodeSent { attempt } => format!(
                "A login code was sent to {}. Reply with the code.",
                attempt.phone_number
            ),
            LoginOutcome::CodeRejected { remaining_attempts } => format!(
                "That code is not valid. {} attempt(s) left.",
                remaining_attempts
            ),
            LoginOutcome::PasswordRequired => {
                "This account has two-step verification. Reply with its password.".to_string()
            }
            LoginOutcome::Completed { session, warning } => {
                let mut text = format!("Login complete. Session saved as #{}.", session.id);
                if let Some(warning) = warning {
                    text.push('\n');
                    text.push_str(warning);
                }
                text
            }
            LoginOutcome::Failed { failure } => failure.user_message(),
            LoginOutcome::Cancelled { reason } => reason.user_message().to_string(),
            LoginOutcome::SessionImported { session } => {
                format!("Session added as #{}.", session.id)
            }
            LoginOutcome::Sessions { sessions } if sessions.is_empty() => {
                "No sessions saved yet.".to_string()
            }
            LoginOutcome::Sessions { sessions } => {
                let lines: Vec<String> = sessions
                    .iter()
                    .map(|s| {
                        format!(
                            "#{} {} ({})",
                            s.id,
                            s.phone_number.as_deref().unwrap_or("unknown number"),
                            s.preview
                        )
                    })
                    .collect();
                format!("Saved sessions:\n{}", lines.join("\n"))
            }
            LoginOutcome::CodeRelayed {
                session_id,
                phone_number,
                code,
            } => format!(
                "Login code for {} (session #{}): {}",
                phone_number, session_id, code
            ),
            LoginOutcome::RelayFailed {
                session_id,
                failure,
            } => format!(
                "Could not get a login code for session #{}: {}",
                session_id,
                failure.user_message()
            ),
            LoginOutcome::RelayTimedOut { session_id } => format!(
                "No login code arrived for session #{} in time.",
                session_id
            ),
            LoginOutcome::Help => HELP_TEXT.to_string(),
        }
    }
}

pub struct SessionManager {
    deps: Arc<ServerDeps>,
    registry: AttemptRegistry,
    machine: LoginMachine,
    effect: LoginEffect,
}

impl SessionManager {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        let machine = LoginMachine::new(deps.login.max_retries);
        let effect = LoginEffect::new(deps.transport.clone());
        Self {
            deps,
            registry: AttemptRegistry::new(),
            machine,
            effect,
        }
    }

    pub fn deps(&self) -> &ServerDeps {
        &self.deps
    }

    // =========================================================================
    // Inbound commands
    // =========================================================================

    pub async fn begin_login(
        &self,
        user_id: UserId,
        phone_number: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let result = self.run_begin(user_id, phone_number, Utc::now()).await;
        self.respond(user_id, result).await
    }

    pub async fn submit_code(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let result = self.run_code(user_id, code).await;
        self.respond(user_id, result).await
    }

    pub async fn submit_password(
        &self,
        user_id: UserId,
        password: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let result = self.run_password(user_id, password).await;
        self.respond(user_id, result).await
    }

    /// Cancel the user's attempt. Waits for an in-flight transport call to
    /// finish first; a second cancel gets `NoActiveAttempt`.
    pub async fn cancel_login(&self, user_id: UserId) -> Result<LoginOutcome, LoginError> {
        let result = self.run_cancel(user_id).await;
        self.respond(user_id, result).await
    }

    /// Sessions visible to the user: the owner sees all of them.
    pub async fn list_sessions(&self, user_id: UserId) -> Result<LoginOutcome, LoginError> {
        let result = self.run_list(user_id).await;
        self.respond(user_id, result).await
    }

    /// Store an already exported session string.
    pub async fn import_session(
        &self,
        user_id: UserId,
        session_string: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let result = self.run_import(user_id, session_string).await;
        self.respond(user_id, result).await
    }

    /// Reconnect a stored session, have the platform send a login code to its
    /// account and pass that code on. Owner only.
    pub async fn relay_code(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let result = self.run_relay(user_id, session_id).await;
        self.respond(user_id, result).await
    }

    /// Route chat-style free text to the matching command.
    pub async fn handle_text(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let current = self.registry.snapshot(user_id).await.map(|s| s.state);

        match classify(text, current.as_ref()) {
            Inbound::Login(phone) => self.begin_login(user_id, &phone).await,
            Inbound::Code(code) => self.submit_code(user_id, &code).await,
            Inbound::Password(password) => self.submit_password(user_id, &password).await,
            Inbound::Cancel => self.cancel_login(user_id).await,
            Inbound::ListSessions => self.list_sessions(user_id).await,
            Inbound::ImportSession(session) => self.import_session(user_id, &session).await,
            Inbound::RelayCode(session_id) => self.relay_code(user_id, &session_id).await,
            Inbound::Help => {
                let result = self
                    .deps
                    .access
                    .check(user_id)
                    .map(|_| LoginOutcome::Help)
                    .map_err(LoginError::from);
                self.respond(user_id, result).await
            }
            Inbound::Unrecognised => {
                let result = match self.deps.access.check(user_id) {
                    Err(e) => Err(e.into()),
                    Ok(()) => Err(match current {
                        Some(state) if !state.is_terminal() => LoginError::UnexpectedInput {
                            state: state.name(),
                            input: "message",
                        },
                        _ => LoginError::NoActiveAttempt,
                    }),
                };
                self.respond(user_id, result).await
            }
        }
    }

    // =========================================================================
    // Timeouts
    // =========================================================================

    /// Cancel every attempt idle for longer than the login timeout. Returns
    /// how many were cancelled.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> usize {
        let mut reaped = 0;
        for user_id in self.registry.expired(now, self.deps.login.login_timeout) {
            if self.expire_if_idle(user_id, now).await {
                reaped += 1;
            }
        }
        if reaped > 0 {
            info!(reaped, "Expired idle login attempts");
        }
        reaped
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub async fn attempt(&self, user_id: UserId) -> Option<AttemptSnapshot> {
        self.registry.snapshot(user_id).await
    }

    pub fn active_attempts(&self) -> usize {
        self.registry.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn run_begin(
        &self,
        user_id: UserId,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check(user_id)?;
        let phone_number = PhoneNumber::parse(phone_number)?;

        // A stale attempt nobody reaped yet must not block a new login.
        self.expire_if_idle(user_id, now).await;

        let mut lease = self.registry.begin(user_id, phone_number.clone(), now)?;
        info!(
            %user_id,
            attempt_id = %lease.id,
            phone = %mask_phone(phone_number.as_str()),
            "Login started"
        );
        self.drive(&mut lease, LoginEvent::PhoneSubmitted { phone_number }, now)
            .await
    }

    async fn run_code(&self, user_id: UserId, code: &str) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check(user_id)?;
        let code = LoginCode::parse(code)?;
        self.run_event(user_id, LoginEvent::CodeSubmitted { code })
            .await
    }

    async fn run_password(
        &self,
        user_id: UserId,
        password: &str,
    ) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check(user_id)?;
        let password = Password::parse(password)?;
        self.run_event(user_id, LoginEvent::PasswordSubmitted { password })
            .await
    }

    async fn run_cancel(&self, user_id: UserId) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check(user_id)?;
        self.run_event(user_id, LoginEvent::CancelRequested).await
    }

    /// Feed an event to the live attempt. An attempt that sat idle past the
    /// timeout is timed out instead.
    async fn run_event(
        &self,
        user_id: UserId,
        event: LoginEvent,
    ) -> Result<LoginOutcome, LoginError> {
        let mut lease = self.registry.acquire(user_id).await?;
        // Idle time is measured from when the lease was granted, not from
        // when the event started waiting for it.
        let now = Utc::now();

        if lease.is_idle(now, self.deps.login.login_timeout) {
            return self.drive(&mut lease, LoginEvent::TimedOut, now).await;
        }
        self.drive(&mut lease, event, now).await
    }

    async fn run_list(&self, user_id: UserId) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check(user_id)?;
        let owner = if self.deps.access.is_owner(user_id) {
            None
        } else {
            Some(user_id)
        };
        let sessions = self.deps.sessions.list(owner).await?;
        Ok(LoginOutcome::Sessions {
            sessions: sessions.iter().map(|s| s.summary()).collect(),
        })
    }

    async fn run_import(
        &self,
        user_id: UserId,
        session_string: &str,
    ) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check(user_id)?;
        let session_string = session_string.trim();
        if session_string.is_empty() {
            return Err(ValidationError::EmptySession.into());
        }

        let stored = self
            .deps
            .sessions
            .save(NewSession {
                owner_id: user_id,
                phone_number: None,
                session_string: session_string.to_string(),
                source: SessionSource::Import,
            })
            .await?;
        info!(%user_id, session_id = %stored.id, "Session imported");
        Ok(LoginOutcome::SessionImported {
            session: stored.summary(),
        })
    }

    async fn run_relay(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<LoginOutcome, LoginError> {
        self.deps.access.check_owner(user_id)?;
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ValidationError::EmptySessionId.into());
        }

        let stored = self
            .deps
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| LoginError::SessionNotFound(session_id.to_string()))?;

        let wait = self
            .deps
            .login
            .login_timeout
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        info!(%user_id, session_id, "Relaying login code for stored session");

        let session_id = stored.id.clone();
        let outcome = match relay_login_code(
            self.deps.transport.clone(),
            &stored.session_string,
            wait,
        )
        .await
        {
            CodeRelay::Relayed { phone_number, code } => LoginOutcome::CodeRelayed {
                session_id,
                phone_number,
                code,
            },
            CodeRelay::Failed(failure) => LoginOutcome::RelayFailed {
                session_id,
                failure,
            },
            CodeRelay::TimedOut => LoginOutcome::RelayTimedOut { session_id },
        };
        Ok(outcome)
    }

    /// Time out the user's attempt if it is idle and nobody is driving it.
    async fn expire_if_idle(&self, user_id: UserId, now: DateTime<Utc>) -> bool {
        let Some(mut lease) = self.registry.try_acquire(user_id) else {
            return false;
        };
        if !lease.is_idle(now, self.deps.login.login_timeout) {
            return false;
        }

        info!(
            %user_id,
            attempt_id = %lease.id,
            state = %lease.state(),
            "Login attempt timed out"
        );
        let result = self.drive(&mut lease, LoginEvent::TimedOut, now).await;
        drop(lease);
        self.respond(user_id, result).await.is_ok()
    }

    /// Run one event under the lease and turn the step into an outcome.
    async fn drive(
        &self,
        lease: &mut AttemptLease,
        event: LoginEvent,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, LoginError> {
        let Advanced {
            step,
            security_warning,
        } = advance(
            &self.machine,
            &self.effect,
            lease,
            event,
            self.deps.login.auto_remove_2fa,
            now,
        )
        .await?;

        if lease.state().is_terminal() {
            self.registry.end(lease);
        }

        match step {
            Step::CodeSent => Ok(LoginOutcome::CodeSent {
                attempt: lease.snapshot(),
            }),
            Step::CodeRetry { remaining } => Ok(LoginOutcome::CodeRejected {
                remaining_attempts: remaining,
            }),
            Step::PasswordRequired => Ok(LoginOutcome::PasswordRequired),
            Step::Failed(failure) => Ok(LoginOutcome::Failed { failure }),
            Step::Cancelled(reason) => Ok(LoginOutcome::Cancelled { reason }),
            Step::Completed { session_string } => {
                let session = NewSession {
                    owner_id: lease.user_id,
                    phone_number: Some(lease.phone_number.as_str().to_string()),
                    session_string,
                    source: SessionSource::Login,
                };
                let stored = self.deps.sessions.save(session).await.map_err(|e| {
                    error!(
                        user_id = %lease.user_id,
                        attempt_id = %lease.id,
                        error = %e,
                        "Failed to persist session"
                    );
                    LoginError::from(e)
                })?;
                info!(user_id = %lease.user_id, session_id = %stored.id, "Session saved");
                Ok(LoginOutcome::Completed {
                    session: stored.summary(),
                    warning: security_warning,
                })
            }
        }
    }

    /// Send the one notification a command produces, then hand back the result.
    async fn respond(
        &self,
        user_id: UserId,
        result: Result<LoginOutcome, LoginError>,
    ) -> Result<LoginOutcome, LoginError> {
        let text = match &result {
            Ok(outcome) => Some(outcome.message()),
            Err(e) => {
                if let LoginError::NotPermitted(_) = e {
                    warn!(%user_id, "Ignoring command from user without access");
                }
                e.user_message()
            }
        };

        if let Some(text) = text {
            if let Err(e) = self.deps.notifier.notify(user_id, &text).await {
                warn!(%user_id, error = %e, "Failed to notify user");
            }
        }
        result
    }
}
