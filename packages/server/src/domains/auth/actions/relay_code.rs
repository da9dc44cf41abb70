//! Relay a login code for an already stored session

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::common::mask_phone;
use crate::domains::auth::connection::LoginConnection;
use crate::domains::auth::types::LoginFailure;
use crate::kernel::BaseLoginTransport;

/// How a code relay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeRelay {
    Relayed { phone_number: String, code: String },
    Failed(LoginFailure),
    /// No code arrived within the wait.
    TimedOut,
}

/// Reconnect a stored session, ask the platform to send a login code to its
/// account and wait up to `wait` for that code to arrive on the session.
///
/// The restored connection is released whatever happens.
pub async fn relay_login_code(
    transport: Arc<dyn BaseLoginTransport>,
    session_string: &str,
    wait: Duration,
) -> CodeRelay {
    let mut conn = match LoginConnection::reconnect(transport, session_string).await {
        Ok(conn) => conn,
        Err(failure) => {
            warn!(reason = %failure, "Could not restore stored session");
            return CodeRelay::Failed(failure);
        }
    };

    let relay = request_and_wait(&mut conn, wait).await;
    conn.release().await;
    relay
}

async fn request_and_wait(conn: &mut LoginConnection, wait: Duration) -> CodeRelay {
    let phone_number = match conn.account_phone().await {
        Ok(phone_number) => phone_number,
        Err(failure) => return CodeRelay::Failed(failure),
    };
    if let Err(failure) = conn.request_code(&phone_number).await {
        return CodeRelay::Failed(failure);
    }
    info!(phone = %mask_phone(&phone_number), "Waiting for login code on stored session");

    match tokio::time::timeout(wait, conn.await_login_code()).await {
        Ok(Ok(code)) => CodeRelay::Relayed { phone_number, code },
        Ok(Err(failure)) => CodeRelay::Failed(failure),
        Err(_) => CodeRelay::TimedOut,
    }
}
