//! Minimal bot API client used to deliver notifications to users.

use reqwest::Client;

use crate::models::{BotApiResponse, SendMessageRequest};
use crate::GatewayError;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct BotOptions {
    pub token: String,
    /// Overrides the public bot API host (local bot API servers, tests).
    pub api_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotService {
    options: BotOptions,
    client: Client,
}

impl BotService {
    pub fn new(options: BotOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        let base = self.options.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        format!(
            "{}/bot{}/{}",
            base.trim_end_matches('/'),
            self.options.token,
            method
        )
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(redact)?;

        let status = res.status().as_u16();
        let body: BotApiResponse = res
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.without_url().to_string()))?;

        if body.ok {
            Ok(())
        } else {
            Err(GatewayError::Rpc {
                status,
                code: "BOT_API_ERROR".to_string(),
                message: body.description,
            })
        }
    }
}

/// Request URLs carry the bot token, so they never make it into an error.
fn redact(err: reqwest::Error) -> GatewayError {
    GatewayError::Http(err.without_url())
}
