use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "https://oddus-gateway.vercel.app";
/// One day.
pub const MAX_UPI_EXPIRY_MINUTES: u64 = 24 * 60;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub owner_id: i64,
    pub gateway_url: String,
    /// `None` means derive `Caramba_<bot id>` once the bot identity is known
    pub gateway_client_id: Option<String>,
    pub gateway_timeout: Duration,
    pub webhook_url: String,
    pub webhook_secret: Option<String>,
    pub listen_port: u16,
    pub upi_expiry_minutes: i64,
    pub sweep_interval: Duration,
    pub database_url: Option<String>,
    pub panel_url: String,
    pub panel_token: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} is not set", key))
        };
        let parsed = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(v) if !v.trim().is_empty() => v
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a number, got {:?}", key, v)),
                _ => Ok(default),
            }
        };
        let optional = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let owner_id = required("OWNER_ID")?
            .trim()
            .parse()
            .context("OWNER_ID must be a Telegram user id")?;

        let upi_expiry_minutes = parsed("UPI_EXPIRY_MINUTES", 10)?;
        if upi_expiry_minutes == 0 || upi_expiry_minutes > MAX_UPI_EXPIRY_MINUTES {
            anyhow::bail!(
                "UPI_EXPIRY_MINUTES must be between 1 and {}, got {}",
                MAX_UPI_EXPIRY_MINUTES,
                upi_expiry_minutes
            );
        }
        let upi_expiry_minutes = upi_expiry_minutes as i64;

        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            owner_id,
            gateway_url: optional("GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            gateway_client_id: optional("GATEWAY_CLIENT_ID"),
            gateway_timeout: Duration::from_secs(parsed("GATEWAY_TIMEOUT_SECS", 15)?),
            webhook_url: required("WEBHOOK_URL")?,
            webhook_secret: optional("WEBHOOK_SECRET"),
            listen_port: parsed("LISTEN_PORT", 8080)?
                .try_into()
                .context("LISTEN_PORT out of range")?,
            upi_expiry_minutes,
            sweep_interval: Duration::from_secs(parsed("SWEEP_INTERVAL_SECS", 30)?.max(1)),
            database_url: optional("DATABASE_URL"),
            panel_url: optional("PANEL_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            panel_token: optional("PANEL_TOKEN").unwrap_or_default(),
        })
    }
}
