use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use crate::common::{AccessPolicy, UserId};
use crate::kernel::LoginSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub gateway_url: String,
    pub api_id: i32,
    pub api_hash: String,
    /// Without a bot token notifications only go to the log.
    pub bot_token: Option<String>,
    pub bot_api_url: Option<String>,
    pub owner_id: UserId,
    pub permitted_users: Vec<UserId>,
    pub allow_public_use: bool,
    pub session_path: PathBuf,
    pub auto_remove_2fa: bool,
    pub login_timeout: chrono::Duration,
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let owner_id = var("OWNER_ID")
            .context("OWNER_ID must be set")?
            .parse::<UserId>()
            .context("OWNER_ID must be a numeric user id")?;

        let permitted_users = var("PERMITTED_USERS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<UserId>()
                    .with_context(|| format!("PERMITTED_USERS contains an invalid user id: {}", s))
            })
            .collect::<Result<Vec<_>>>()?;

        let login_timeout_secs: u64 = var("LOGIN_TIMEOUT")
            .unwrap_or_else(|| "300".to_string())
            .parse()
            .context("LOGIN_TIMEOUT must be a number of seconds")?;
        if login_timeout_secs == 0 {
            bail!("LOGIN_TIMEOUT must be greater than zero");
        }
        let login_timeout = i64::try_from(login_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("LOGIN_TIMEOUT is too large")?;

        Ok(Self {
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            gateway_url: var("GATEWAY_URL").context("GATEWAY_URL must be set")?,
            api_id: var("API_ID")
                .context("API_ID must be set")?
                .parse()
                .context("API_ID must be a number")?,
            api_hash: var("API_HASH").context("API_HASH must be set")?,
            bot_token: var("BOT_TOKEN").filter(|t| !t.trim().is_empty()),
            bot_api_url: var("BOT_API_URL"),
            owner_id,
            permitted_users,
            allow_public_use: flag(&var, "ALLOW_PUBLIC_USE", false)?,
            session_path: PathBuf::from(
                var("SESSION_PATH").unwrap_or_else(|| "sessions/".to_string()),
            ),
            auto_remove_2fa: flag(&var, "AUTO_REMOVE_2FA", true)?,
            login_timeout,
            max_retries: var("MAX_RETRIES")
                .unwrap_or_else(|| "3".to_string())
                .parse()
                .context("MAX_RETRIES must be a valid number")?,
        })
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::owner_only(self.owner_id)
            .with_permitted_users(self.permitted_users.iter().copied())
            .with_public_use(self.allow_public_use)
    }

    pub fn login_settings(&self) -> LoginSettings {
        LoginSettings {
            max_retries: self.max_retries,
            login_timeout: self.login_timeout,
            auto_remove_2fa: self.auto_remove_2fa,
        }
    }
}

fn flag(var: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be true or false, got {:?}", key, other),
    }
}
