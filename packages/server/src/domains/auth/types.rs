//! Auth domain data types
//!
//! States, failure reasons and outcomes shared by the state machine, the
//! transport adapter and the session manager.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the platform refused a login step.
///
/// This is the closed set of reasons the transport adapter may report. Every
/// platform-specific error is translated into one of these before it reaches
/// the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LoginFailure {
    InvalidPhoneNumber,
    BannedNumber,
    RateLimited { retry_after_secs: u64 },
    InvalidCode,
    ExpiredCode,
    PasswordRequired,
    InvalidPassword,
    TransportError { detail: String },
}

impl LoginFailure {
    pub fn transport(detail: impl Into<String>) -> Self {
        LoginFailure::TransportError {
            detail: detail.into(),
        }
    }

    /// Human-readable cause plus the next allowed action, sent to the user.
    pub fn user_message(&self) -> String {
        match self {
            LoginFailure::InvalidPhoneNumber => {
                "The platform rejected this phone number. \
                 Check the number and start again with /login."
                    .to_string()
            }
            LoginFailure::BannedNumber => {
                "This phone number is banned on the platform and cannot be logged in.".to_string()
            }
            LoginFailure::RateLimited { retry_after_secs } => format!(
                "Too many attempts. The platform asks to wait {} seconds before trying again.",
                retry_after_secs
            ),
            LoginFailure::InvalidCode => {
                "The login code was wrong too many times. Start again with /login.".to_string()
            }
            LoginFailure::ExpiredCode => {
                "The login code has expired. Start again with /login to get a new one.".to_string()
            }
            LoginFailure::PasswordRequired => {
                "This account needs its two-step verification password.".to_string()
            }
            LoginFailure::InvalidPassword => {
                "The two-step verification password is wrong. Start again with /login.".to_string()
            }
            LoginFailure::TransportError { detail } => {
                format!("Login failed because of a connection problem: {}", detail)
            }
        }
    }
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginFailure::InvalidPhoneNumber => write!(f, "invalid phone number"),
            LoginFailure::BannedNumber => write!(f, "banned number"),
            LoginFailure::RateLimited { retry_after_secs } => {
                write!(f, "rate limited for {}s", retry_after_secs)
            }
            LoginFailure::InvalidCode => write!(f, "invalid code"),
            LoginFailure::ExpiredCode => write!(f, "expired code"),
            LoginFailure::PasswordRequired => write!(f, "password required"),
            LoginFailure::InvalidPassword => write!(f, "invalid password"),
            LoginFailure::TransportError { detail } => write!(f, "transport error: {}", detail),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    UserRequested,
    TimedOut,
}

impl CancelReason {
    pub fn user_message(&self) -> &'static str {
        match self {
            CancelReason::UserRequested => "Login cancelled.",
            CancelReason::TimedOut => {
                "Login cancelled because nothing happened for too long. Start again with /login."
            }
        }
    }
}

/// Where a login attempt currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginState {
    AwaitingPhone,
    CodeRequested,
    AwaitingCode,
    PasswordRequired,
    AwaitingPassword,
    Completed,
    Failed { failure: LoginFailure },
    Cancelled { reason: CancelReason },
}

impl LoginState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoginState::Completed | LoginState::Failed { .. } | LoginState::Cancelled { .. }
        )
    }

    /// States in which the attempt owns an open transport connection.
    pub fn holds_connection(&self) -> bool {
        matches!(
            self,
            LoginState::CodeRequested
                | LoginState::AwaitingCode
                | LoginState::PasswordRequired
                | LoginState::AwaitingPassword
        )
    }

    /// Position along the transition graph. Terminal states share the last rank.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            LoginState::AwaitingPhone => 0,
            LoginState::CodeRequested => 1,
            LoginState::AwaitingCode => 2,
            LoginState::PasswordRequired => 3,
            LoginState::AwaitingPassword => 4,
            LoginState::Completed | LoginState::Failed { .. } | LoginState::Cancelled { .. } => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoginState::AwaitingPhone => "awaiting_phone",
            LoginState::CodeRequested => "code_requested",
            LoginState::AwaitingCode => "awaiting_code",
            LoginState::PasswordRequired => "password_required",
            LoginState::AwaitingPassword => "awaiting_password",
            LoginState::Completed => "completed",
            LoginState::Failed { .. } => "failed",
            LoginState::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(LoginState::Completed.is_terminal());
        assert!(LoginState::Failed {
            failure: LoginFailure::InvalidCode
        }
        .is_terminal());
        assert!(LoginState::Cancelled {
            reason: CancelReason::TimedOut
        }
        .is_terminal());
        assert!(!LoginState::AwaitingCode.is_terminal());
    }

    #[test]
    fn test_connection_range() {
        assert!(!LoginState::AwaitingPhone.holds_connection());
        assert!(LoginState::CodeRequested.holds_connection());
        assert!(LoginState::AwaitingPassword.holds_connection());
        assert!(!LoginState::Completed.holds_connection());
    }

    #[test]
    fn test_rate_limit_message_carries_retry_after_verbatim() {
        let msg = LoginFailure::RateLimited {
            retry_after_secs: 1234,
        }
        .user_message();
        assert!(msg.contains("1234 seconds"));
    }

    #[test]
    fn test_failure_serializes_with_reason_tag() {
        let json = serde_json::to_value(LoginFailure::RateLimited {
            retry_after_secs: 30,
        })
        .unwrap();
        assert_eq!(json["reason"], "rate_limited");
        assert_eq!(json["retry_after_secs"], 30);
    }
}
