//! Free-text classification for chat-style input.
//!
//! The same text can mean different things depending on where the user's
//! login stands: six digits are a code while a code is awaited, and anything
//! at all is a password while a password is awaited.

use super::models::{LoginCode, PhoneNumber};
use super::types::LoginState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Help,
    Cancel,
    /// Start a login; the argument is validated later.
    Login(String),
    Code(String),
    Password(String),
    ListSessions,
    ImportSession(String),
    /// Fetch a fresh login code for a stored session (owner only).
    RelayCode(String),
    /// Nothing we understand in the current context.
    Unrecognised,
}

/// Classify `text` given the state of the user's live attempt, if any.
pub fn classify(text: &str, current: Option<&LoginState>) -> Inbound {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Inbound::Unrecognised;
    }

    // Keep trailing whitespace: it may belong to a password.
    if let Some(command) = text.trim_start().strip_prefix('/') {
        return classify_command(command);
    }

    if trimmed.eq_ignore_ascii_case("cancel") {
        return Inbound::Cancel;
    }

    match current {
        Some(LoginState::AwaitingPassword) => Inbound::Password(text.to_string()),
        Some(LoginState::AwaitingCode) if looks_like_code(trimmed) => {
            Inbound::Code(trimmed.to_string())
        }
        _ if PhoneNumber::looks_valid(trimmed) => Inbound::Login(trimmed.to_string()),
        _ => Inbound::Unrecognised,
    }
}

fn classify_command(command: &str) -> Inbound {
    // `raw` is everything after the single separator, exactly as typed.
    let (name, raw) = match command.split_once(char::is_whitespace) {
        Some((name, raw)) => (name, raw),
        None => (command.trim_end(), ""),
    };
    let arg = raw.trim();
    // Group chats address bots as /command@bot_name.
    let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();

    match name.as_str() {
        "start" | "help" => Inbound::Help,
        "cancel" => Inbound::Cancel,
        "login" if is_session_id(arg) => Inbound::RelayCode(arg.to_string()),
        "login" => Inbound::Login(arg.to_string()),
        "otp" => Inbound::RelayCode(arg.to_string()),
        "code" => Inbound::Code(arg.to_string()),
        "password" => Inbound::Password(raw.to_string()),
        "sessions" => Inbound::ListSessions,
        "add" => Inbound::ImportSession(arg.to_string()),
        _ => Inbound::Unrecognised,
    }
}

/// Session ids are short numbers; anything long enough to be a phone number
/// starts a login instead.
fn is_session_id(arg: &str) -> bool {
    !arg.is_empty() && arg.chars().all(|c| c.is_ascii_digit()) && !PhoneNumber::looks_valid(arg)
}

/// Digits with the separators people paste codes with. Whether it is the
/// right length is for validation to say.
fn looks_like_code(text: &str) -> bool {
    LoginCode::looks_valid(text)
        || (text.chars().any(|c| c.is_ascii_digit())
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || c == ' ' || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert_eq!(classify("/start", None), Inbound::Help);
        assert_eq!(classify("/cancel", None), Inbound::Cancel);
        assert_eq!(
            classify("/login +15551234567", None),
            Inbound::Login("+15551234567".to_string())
        );
        assert_eq!(classify("/code 12345", None), Inbound::Code("12345".to_string()));
        assert_eq!(
            classify("/password correct horse", None),
            Inbound::Password("correct horse".to_string())
        );
        assert_eq!(classify("/sessions", None), Inbound::ListSessions);
        assert_eq!(
            classify("/add 1BVtsOK4Bu", None),
            Inbound::ImportSession("1BVtsOK4Bu".to_string())
        );
        assert_eq!(classify("/add", None), Inbound::ImportSession(String::new()));
        assert_eq!(classify("/nope", None), Inbound::Unrecognised);
    }

    #[test]
    fn test_password_command_keeps_spaces() {
        // Same password whether sent bare or through /password.
        let awaiting = LoginState::AwaitingPassword;
        assert_eq!(
            classify("/password  spaced pass ", Some(&awaiting)),
            Inbound::Password(" spaced pass ".to_string())
        );
        assert_eq!(
            classify(" spaced pass ", Some(&awaiting)),
            Inbound::Password(" spaced pass ".to_string())
        );
        assert_eq!(classify("/password", None), Inbound::Password(String::new()));
    }

    #[test]
    fn test_relay_commands() {
        assert_eq!(classify("/otp 3", None), Inbound::RelayCode("3".to_string()));
        assert_eq!(classify("/login 12", None), Inbound::RelayCode("12".to_string()));
        assert_eq!(classify("/otp", None), Inbound::RelayCode(String::new()));
        assert_eq!(
            classify("/login 15551234567", None),
            Inbound::Login("15551234567".to_string())
        );
        assert_eq!(classify("/login", None), Inbound::Login(String::new()));
    }

    #[test]
    fn test_command_with_bot_suffix() {
        assert_eq!(classify("/Sessions@login_bot", None), Inbound::ListSessions);
    }

    #[test]
    fn test_plain_cancel() {
        assert_eq!(classify("Cancel", Some(&LoginState::AwaitingCode)), Inbound::Cancel);
    }

    #[test]
    fn test_phone_shaped_text_starts_login() {
        assert_eq!(
            classify(" +15551234567 ", None),
            Inbound::Login("+15551234567".to_string())
        );
        assert_eq!(classify("555123", None), Inbound::Unrecognised);
    }

    #[test]
    fn test_code_only_while_awaiting_code() {
        let awaiting = LoginState::AwaitingCode;
        assert_eq!(classify("12345", Some(&awaiting)), Inbound::Code("12345".to_string()));
        assert_eq!(classify("12 345", Some(&awaiting)), Inbound::Code("12 345".to_string()));
        // Wrong length still goes to validation.
        assert_eq!(classify("123", Some(&awaiting)), Inbound::Code("123".to_string()));
        assert_eq!(classify("12345", None), Inbound::Unrecognised);
        assert_eq!(classify("hello", Some(&awaiting)), Inbound::Unrecognised);
    }

    #[test]
    fn test_anything_is_a_password_while_awaiting_one() {
        let awaiting = LoginState::AwaitingPassword;
        assert_eq!(
            classify("12345", Some(&awaiting)),
            Inbound::Password("12345".to_string())
        );
        assert_eq!(
            classify("+15551234567", Some(&awaiting)),
            Inbound::Password("+15551234567".to_string())
        );
        assert_eq!(
            classify(" spaced pass ", Some(&awaiting)),
            Inbound::Password(" spaced pass ".to_string())
        );
    }
}
