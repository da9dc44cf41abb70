use std::sync::Arc;

use tracing::{debug, info, warn};

use super::commands::LoginCommand;
use super::connection::LoginConnection;
use super::models::Attempt;
use super::types::{CancelReason, LoginFailure};
use crate::common::mask_phone;
use crate::kernel::BaseLoginTransport;

/// What the transport said about a command.
#[derive(Debug)]
pub enum TransportOutcome {
    CodeSent,
    /// The connection is authorized and has been exported.
    Authorized { session_string: String },
    Rejected(LoginFailure),
    Released(CancelReason),
}

impl TransportOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportOutcome::CodeSent => "code_sent",
            TransportOutcome::Authorized { .. } => "authorized",
            TransportOutcome::Rejected(_) => "rejected",
            TransportOutcome::Released(_) => "released",
        }
    }
}

/// Login effect - executes machine commands against the platform transport
///
/// The effect owns no state. The connection it works on lives in the attempt
/// and the effect attaches, uses or releases it.
#[derive(Clone)]
pub struct LoginEffect {
    transport: Arc<dyn BaseLoginTransport>,
}

impl LoginEffect {
    pub fn new(transport: Arc<dyn BaseLoginTransport>) -> Self {
        Self { transport }
    }

    pub async fn execute(&self, cmd: LoginCommand, attempt: &mut Attempt) -> TransportOutcome {
        let attempt_id = attempt.id;
        match cmd {
            LoginCommand::RequestCode { phone_number } => {
                debug!(
                    %attempt_id,
                    phone = %mask_phone(phone_number.as_str()),
                    "Requesting login code"
                );

                if !attempt.has_connection() {
                    match LoginConnection::open(self.transport.clone()).await {
                        Ok(conn) => attempt.attach_connection(conn),
                        Err(failure) => return TransportOutcome::Rejected(failure),
                    }
                }

                match self.connection(attempt) {
                    Ok(conn) => match conn.request_code(phone_number.as_str()).await {
                        Ok(()) => {
                            info!(%attempt_id, "Login code sent");
                            TransportOutcome::CodeSent
                        }
                        Err(failure) => TransportOutcome::Rejected(failure),
                    },
                    Err(failure) => TransportOutcome::Rejected(failure),
                }
            }

            LoginCommand::SubmitCode { phone_number, code } => {
                let conn = match self.connection(attempt) {
                    Ok(conn) => conn,
                    Err(failure) => return TransportOutcome::Rejected(failure),
                };
                match conn.submit_code(phone_number.as_str(), code.as_str()).await {
                    Ok(()) => export(conn).await,
                    Err(failure) => TransportOutcome::Rejected(failure),
                }
            }

            LoginCommand::SubmitPassword { password } => {
                let conn = match self.connection(attempt) {
                    Ok(conn) => conn,
                    Err(failure) => return TransportOutcome::Rejected(failure),
                };
                match conn.submit_password(password.expose()).await {
                    Ok(()) => {
                        let outcome = export(conn).await;
                        if let TransportOutcome::Authorized { .. } = outcome {
                            attempt.remember_password(password);
                        }
                        outcome
                    }
                    Err(failure) => TransportOutcome::Rejected(failure),
                }
            }

            LoginCommand::Release { reason } => {
                if let Some(conn) = attempt.take_connection() {
                    conn.release().await;
                }
                TransportOutcome::Released(reason)
            }
        }
    }

    /// Best-effort removal of the second factor on a freshly authorized
    /// connection. Returns a warning for the user when it did not work.
    pub async fn relax_security(&self, attempt: &mut Attempt) -> Option<String> {
        let attempt_id = attempt.id;
        let password = attempt.take_password();
        let conn = attempt.connection_mut()?;

        match conn.relax_security(password.as_ref().map(|p| p.expose())).await {
            Ok(()) => {
                info!(%attempt_id, "Second factor removed after login");
                None
            }
            Err(failure) => {
                warn!(%attempt_id, reason = %failure, "Could not remove second factor after login");
                Some(format!(
                    "Warning: two-step verification could not be disabled ({}).",
                    failure
                ))
            }
        }
    }

    fn connection<'a>(
        &self,
        attempt: &'a mut Attempt,
    ) -> Result<&'a mut LoginConnection, LoginFailure> {
        attempt
            .connection_mut()
            .ok_or_else(|| LoginFailure::transport("login connection is gone"))
    }
}

async fn export(conn: &mut LoginConnection) -> TransportOutcome {
    match conn.export_session().await {
        Ok(session_string) => TransportOutcome::Authorized { session_string },
        Err(failure) => {
            warn!(reason = %failure, "Authorized but session export failed");
            TransportOutcome::Rejected(failure)
        }
    }
}
