//! Configuration module for the bot.
//!
//! Loads configuration from environment variables (a `.env` file is honoured).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Bot running mode
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// A channel the subscription task requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Button label.
    pub name: String,
    /// Telegram chat id of the channel.
    pub chat_id: i64,
    /// Public link opened by the button.
    pub url: String,
}

/// Flood guard windows and block base.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// TTL of the window used for bot commands.
    pub fast_window: Duration,
    /// TTL of the window used for every other message.
    pub default_window: Duration,
    /// First block lasts twice this long, then doubles per repeat offence.
    pub base_block: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            fast_window: Duration::from_secs(5),
            default_window: Duration::from_secs(2),
            base_block: Duration::from_secs(10),
        }
    }
}

/// Broadcast worker settings.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Number of campaigns drained in parallel.
    pub workers: usize,
    /// Floor of the adaptive inter-message delay.
    pub min_delay: Duration,
    /// Ceiling of the adaptive inter-message delay.
    pub max_delay: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(1000),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @) for referral links.
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Administrator user IDs (comma-separated).
    /// They get the admin panel, the campaign composer and operational alerts.
    pub admin_ids: Vec<u64>,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    // Channels and tasks
    pub main_channel: Option<ChannelConfig>,
    pub channels: Vec<ChannelConfig>,
    pub boost_chat_id: Option<i64>,
    pub boost_url: Option<String>,
    pub name_marker: String,

    pub throttle: ThrottleConfig,
    pub broadcast: BroadcastConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bot_mode = match env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = optional("WEBHOOK_URL");
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::Missing("WEBHOOK_URL"));
        }

        // Parse bot username (strip @ if present)
        let bot_username = optional("BOT_USERNAME")
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        let main_channel = match optional("MAIN_CHANNEL_ID") {
            Some(raw) => Some(ChannelConfig {
                name: optional("MAIN_CHANNEL_NAME").unwrap_or_else(|| "Channel".to_string()),
                chat_id: parse_value("MAIN_CHANNEL_ID", &raw)?,
                url: optional("MAIN_CHANNEL_URL").ok_or(ConfigError::Missing("MAIN_CHANNEL_URL"))?,
            }),
            None => None,
        };

        let channels = match optional("CHANNELS") {
            Some(raw) => parse_channels(&raw)?,
            None => Vec::new(),
        };

        let boost_chat_id = optional("BOOST_CHAT_ID")
            .map(|raw| parse_value("BOOST_CHAT_ID", &raw))
            .transpose()?;

        let throttle = ThrottleConfig {
            fast_window: Duration::from_secs(parse_or("THROTTLE_FAST_SECS", 5)?),
            default_window: Duration::from_secs(parse_or("THROTTLE_DEFAULT_SECS", 2)?),
            base_block: Duration::from_secs(parse_or("FLOOD_BASE_BLOCK_SECS", 10)?),
        };

        let broadcast = BroadcastConfig {
            workers: parse_or("BROADCAST_WORKERS", 2usize)?.max(1),
            min_delay: Duration::from_millis(parse_or("BROADCAST_MIN_DELAY_MS", 50)?),
            max_delay: Duration::from_millis(parse_or("BROADCAST_MAX_DELAY_MS", 1000)?),
        };

        Ok(Self {
            bot_token: optional("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?,
            bot_mode,
            webhook_url,
            webhook_port: parse_or("WEBHOOK_PORT", 8443)?,
            webhook_secret: optional("WEBHOOK_SECRET"),
            bot_username,
            admin_ids: parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default()),
            mongodb_uri: optional("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
            mongodb_database: optional("MONGODB_DATABASE").unwrap_or_else(|| "bonusbot".to_string()),
            main_channel,
            channels,
            boost_chat_id,
            boost_url: optional("BOOST_URL"),
            name_marker: optional("NAME_MARKER").unwrap_or_else(|| "clown".to_string()),
            throttle,
            broadcast,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

/// Parse `ADMIN_IDS`, silently skipping garbage entries.
pub fn parse_admin_ids(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

/// Parse `CHANNELS` in the form `name|chat_id|url;name|chat_id|url`.
pub fn parse_channels(raw: &str) -> Result<Vec<ChannelConfig>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            match parts.as_slice() {
                [name, chat_id, url] => Ok(ChannelConfig {
                    name: name.to_string(),
                    chat_id: parse_value("CHANNELS", chat_id)?,
                    url: url.to_string(),
                }),
                _ => Err(ConfigError::Invalid {
                    name: "CHANNELS",
                    value: entry.to_string(),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_ids_skip_garbage() {
        assert_eq!(parse_admin_ids("1, 2,abc,,3"), vec![1, 2, 3]);
        assert!(parse_admin_ids("").is_empty());
    }

    #[test]
    fn channels_parse_triplets() {
        let channels =
            parse_channels("Main|-1001|https://t.me/main; Chat|-1002|https://t.me/chat").unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].chat_id, -1002);
        assert_eq!(channels[1].url, "https://t.me/chat");
    }

    #[test]
    fn channels_reject_malformed_entry() {
        let err = parse_channels("Main|-1001").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CHANNELS", .. }));

        let err = parse_channels("Main|abc|https://t.me/main").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
