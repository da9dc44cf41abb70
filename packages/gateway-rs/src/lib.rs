//! HTTP client for the platform login gateway.
//!
//! The gateway is a sidecar that owns the messaging platform's wire protocol and
//! exposes each login step as a JSON endpoint. Every connection it hands out is
//! an unauthorized platform session until `sign_in` or `check_password` succeeds.

pub mod bot;
mod error;
pub mod models;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{
    Authorization, ConnectRequest, ConnectResponse, ErrorBody, ExportedSession, LoginCodeMessage,
    PasswordRequest, ReconnectRequest, SendCodeRequest, SentCode, SignInRequest,
};

pub use bot::{BotOptions, BotService};
pub use error::GatewayError;

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub base_url: String,
    pub api_id: i32,
    pub api_hash: String,
}

#[derive(Debug, Clone)]
pub struct GatewayService {
    options: GatewayOptions,
    client: Client,
}

impl GatewayService {
    pub fn new(options: GatewayOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.options.base_url.trim_end_matches('/'), path)
    }

    /// Open a fresh, unauthorized connection and return its id.
    pub async fn connect(&self) -> Result<String, GatewayError> {
        let body = ConnectRequest {
            api_id: self.options.api_id,
            api_hash: &self.options.api_hash,
        };
        let res: ConnectResponse = self.post("connections", &body).await?;
        debug!(connection_id = %res.connection_id, "Gateway connection opened");
        Ok(res.connection_id)
    }

    /// Open a connection that is already authorized by an exported session.
    pub async fn reconnect(&self, session_string: &str) -> Result<String, GatewayError> {
        let body = ReconnectRequest {
            api_id: self.options.api_id,
            api_hash: &self.options.api_hash,
            session_string,
        };
        let res: ConnectResponse = self.post("connections/restore", &body).await?;
        debug!(connection_id = %res.connection_id, "Gateway connection restored");
        Ok(res.connection_id)
    }

    /// Account an authorized connection belongs to.
    pub async fn get_me(&self, connection_id: &str) -> Result<Authorization, GatewayError> {
        let path = format!("connections/{}/me", connection_id);
        let res = self.client.get(self.url(&path)).send().await?;
        let res = check_status(res).await?;
        res.json::<Authorization>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Long-poll until the platform's service chat delivers a login code to
    /// this connection. The gateway buffers messages from the moment the
    /// connection is opened, so a code requested just before is not lost.
    pub async fn wait_login_code(&self, connection_id: &str) -> Result<String, GatewayError> {
        let path = format!("connections/{}/wait_login_code", connection_id);
        let res: LoginCodeMessage = self.post(&path, &serde_json::json!({})).await?;
        Ok(res.code)
    }

    pub async fn send_code(
        &self,
        connection_id: &str,
        phone_number: &str,
    ) -> Result<SentCode, GatewayError> {
        let path = format!("connections/{}/send_code", connection_id);
        self.post(&path, &SendCodeRequest { phone_number }).await
    }

    pub async fn sign_in(
        &self,
        connection_id: &str,
        phone_number: &str,
        phone_code_hash: &str,
        code: &str,
    ) -> Result<Authorization, GatewayError> {
        let path = format!("connections/{}/sign_in", connection_id);
        let body = SignInRequest {
            phone_number,
            phone_code_hash,
            code,
        };
        self.post(&path, &body).await
    }

    pub async fn check_password(
        &self,
        connection_id: &str,
        password: &str,
    ) -> Result<Authorization, GatewayError> {
        let path = format!("connections/{}/check_password", connection_id);
        self.post(&path, &PasswordRequest { password }).await
    }

    /// Export the authorized connection as a reusable session string.
    pub async fn export_session(&self, connection_id: &str) -> Result<String, GatewayError> {
        let path = format!("connections/{}/export_session", connection_id);
        let res: ExportedSession = self.post(&path, &serde_json::json!({})).await?;
        Ok(res.session_string)
    }

    /// Remove the account's cloud password. Requires the current password.
    pub async fn remove_password(
        &self,
        connection_id: &str,
        password: &str,
    ) -> Result<(), GatewayError> {
        let path = format!("connections/{}/remove_password", connection_id);
        let res = self
            .client
            .post(self.url(&path))
            .json(&PasswordRequest { password })
            .send()
            .await?;
        check_status(res).await.map(|_| ())
    }

    /// Tell the gateway to drop the connection. Unknown ids are not an error.
    pub async fn disconnect(&self, connection_id: &str) -> Result<(), GatewayError> {
        let path = format!("connections/{}", connection_id);
        let res = self.client.delete(self.url(&path)).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(connection_id, "Gateway connection already gone");
            return Ok(());
        }
        check_status(res).await.map(|_| ())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let res = self.client.post(self.url(path)).json(body).send().await?;
        let res = check_status(res).await?;
        res.json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

async fn check_status(res: Response) -> Result<Response, GatewayError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let text = res.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %text, "Gateway returned an error");
    Err(parse_error(status.as_u16(), &text))
}

/// Build a `GatewayError::Rpc` from an error body, falling back to the HTTP
/// status when the body is not the expected JSON shape.
pub(crate) fn parse_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => GatewayError::Rpc {
            status,
            code: parsed.error,
            message: parsed.message,
        },
        Err(_) => GatewayError::Rpc {
            status,
            code: format!("HTTP_{}", status),
            message: (!body.is_empty()).then(|| body.to_string()),
        },
    }
}
