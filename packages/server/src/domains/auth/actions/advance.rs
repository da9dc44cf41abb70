//! Drive one event through an attempt

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domains::auth::effects::LoginEffect;
use crate::domains::auth::errors::LoginError;
use crate::domains::auth::events::LoginEvent;
use crate::domains::auth::machines::{LoginMachine, Step};
use crate::domains::auth::models::Attempt;

/// Result of advancing an attempt by one event
#[derive(Debug)]
pub struct Advanced {
    pub step: Step,
    /// Set when the login completed but the second factor could not be removed.
    pub security_warning: Option<String>,
}

/// Decide, execute, apply.
///
/// A rejected event leaves the attempt untouched. Once the attempt is
/// terminal its connection has been released, whatever the outcome was.
/// Activity is stamped when the transport answers, so a slow platform call
/// does not eat into the user's idle allowance.
pub async fn advance(
    machine: &LoginMachine,
    effect: &LoginEffect,
    attempt: &mut Attempt,
    event: LoginEvent,
    relax_security: bool,
    now: DateTime<Utc>,
) -> Result<Advanced, LoginError> {
    let command = machine.decide(attempt, &event)?;
    machine.prepare(attempt, &command, now);

    let outcome = effect.execute(command, attempt).await;
    let step = machine.apply(attempt, outcome, Utc::now().max(now));

    let mut security_warning = None;
    if let Step::Completed { .. } = step {
        info!(attempt_id = %attempt.id, user_id = %attempt.user_id, "Login completed");
        if relax_security {
            security_warning = effect.relax_security(attempt).await;
        }
    }

    if attempt.state().is_terminal() {
        attempt.take_password();
        if let Some(connection) = attempt.take_connection() {
            connection.release().await;
        }
    }

    Ok(Advanced {
        step,
        security_warning,
    })
}
