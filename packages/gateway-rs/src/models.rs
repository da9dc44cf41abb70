use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ConnectRequest<'a> {
    pub api_id: i32,
    pub api_hash: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ReconnectRequest<'a> {
    pub api_id: i32,
    pub api_hash: &'a str,
    pub session_string: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResponse {
    pub connection_id: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeRequest<'a> {
    pub phone_number: &'a str,
}

/// Returned by the gateway once the platform has dispatched a login code.
#[derive(Debug, Clone, Deserialize)]
pub struct SentCode {
    pub phone_code_hash: String,
    /// Delivery channel reported by the platform ("app", "sms", "call", ...).
    #[serde(default)]
    pub delivery: Option<String>,
    /// Seconds until the platform allows asking for the code again.
    #[serde(default)]
    pub timeout: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub phone_number: &'a str,
    pub phone_code_hash: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PasswordRequest<'a> {
    pub password: &'a str,
}

/// Account the connection is now authorized as.
#[derive(Debug, Clone, Deserialize)]
pub struct Authorization {
    pub user_id: i64,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A login code the platform sent to an authorized account.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginCodeMessage {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedSession {
    pub session_string: String,
}

/// Error body the gateway sends with every non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct BotApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}
