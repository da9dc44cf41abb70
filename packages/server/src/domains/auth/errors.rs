use thiserror::Error;

use crate::common::AccessError;

/// Malformed user input, rejected before any transport call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("phone number must be 10 to 15 digits with an optional leading +")]
    MalformedPhoneNumber,
    #[error("login code must be 5 or 6 digits")]
    MalformedCode,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("session string must not be empty")]
    EmptySession,
    #[error("session id must not be empty")]
    EmptySessionId,
}

/// Typed result of an inbound command that did not produce a login outcome.
///
/// Transport failures are not errors here: they drive the attempt into
/// FAILED and come back as an outcome.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("a login is already in progress for this user")]
    AlreadyPending,

    #[error("no login is in progress for this user")]
    NoActiveAttempt,

    #[error("no stored session with id {0}")]
    SessionNotFound(String),

    #[error("{input} is not expected while the login is {state}")]
    UnexpectedInput {
        state: &'static str,
        input: &'static str,
    },

    #[error(transparent)]
    NotPermitted(#[from] AccessError),

    #[error("session storage failed: {0}")]
    Storage(String),
}

impl LoginError {
    /// Text sent to the user for this error, or `None` when the user should
    /// not hear back (unknown users).
    pub fn user_message(&self) -> Option<String> {
        match self {
            LoginError::Validation(ValidationError::MalformedPhoneNumber) => Some(
                "That does not look like a phone number. \
                 Send it in international format, e.g. +15551234567."
                    .to_string(),
            ),
            LoginError::Validation(ValidationError::MalformedCode) => {
                Some("The login code must be 5 or 6 digits.".to_string())
            }
            LoginError::Validation(ValidationError::EmptyPassword) => {
                Some("The password must not be empty.".to_string())
            }
            LoginError::Validation(ValidationError::EmptySession) => {
                Some("Usage: /add <session string>".to_string())
            }
            LoginError::Validation(ValidationError::EmptySessionId) => {
                Some("Usage: /otp <session id>".to_string())
            }
            LoginError::AlreadyPending => Some(
                "A login is already in progress. Finish it or send /cancel first.".to_string(),
            ),
            LoginError::NoActiveAttempt => {
                Some("No login is in progress. Send /login <phone number> to start.".to_string())
            }
            LoginError::SessionNotFound(id) => Some(format!(
                "There is no saved session #{}. /sessions lists them.",
                id
            )),
            LoginError::UnexpectedInput { state, input } => Some(format!(
                "A {} was not expected right now (login is {}).",
                input, state
            )),
            LoginError::NotPermitted(_) => None,
            LoginError::Storage(_) => Some(
                "The login succeeded but the session could not be saved. Please try again."
                    .to_string(),
            ),
        }
    }
}

impl From<anyhow::Error> for LoginError {
    fn from(err: anyhow::Error) -> Self {
        LoginError::Storage(format!("{:#}", err))
    }
}
