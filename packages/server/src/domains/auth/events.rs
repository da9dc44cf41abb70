use super::models::{LoginCode, Password, PhoneNumber};

/// Auth events - facts about what arrived for a login attempt
///
/// Input is validated before it becomes an event, so every event here is
/// well-formed. Whether it fits the attempt's current state is for the
/// machine to decide.
#[derive(Debug, Clone)]
pub enum LoginEvent {
    /// The user sent a phone number to log in with
    PhoneSubmitted { phone_number: PhoneNumber },

    /// The user sent the one-time code
    CodeSubmitted { code: LoginCode },

    /// The user sent the second-factor password
    PasswordSubmitted { password: Password },

    /// The user asked to stop
    CancelRequested,

    /// Nothing happened for longer than the login timeout
    TimedOut,
}

impl LoginEvent {
    /// Short name used in "unexpected input" replies and logs.
    pub fn input_name(&self) -> &'static str {
        match self {
            LoginEvent::PhoneSubmitted { .. } => "phone number",
            LoginEvent::CodeSubmitted { .. } => "login code",
            LoginEvent::PasswordSubmitted { .. } => "password",
            LoginEvent::CancelRequested => "cancel",
            LoginEvent::TimedOut => "timeout",
        }
    }
}
