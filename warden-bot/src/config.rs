use std::env;
use std::time::Duration;

use anyhow::Context as _;

use warden_commands::DEFAULT_MODLOG_CHANNEL;
use warden_core::ModerationPolicy;
use warden_utils::parse::MAX_SANCTION_SECONDS;

/// Startup settings read from the process environment.
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: String,
    pub guild_id: Option<u64>,
    pub database_url: Option<String>,
    pub auto_run_migrations: bool,
    pub modlog_enabled: bool,
    pub modlog_channel_name: String,
    pub sweep_interval: Duration,
    pub policy: ModerationPolicy,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let token = env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?;
        let guild_id = match env_string("DISCORD_GUILD_ID") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .with_context(|| format!("DISCORD_GUILD_ID `{raw}` is not a valid id"))?,
            ),
            None => None,
        };

        Ok(Self {
            token,
            guild_id,
            database_url: env_string("DATABASE_URL"),
            auto_run_migrations: env_bool("AUTO_RUN_MIGRATIONS", true),
            modlog_enabled: env_bool("MODLOG_ENABLED", true),
            modlog_channel_name: env_string("MODLOG_CHANNEL_NAME")
                .unwrap_or_else(|| DEFAULT_MODLOG_CHANNEL.to_owned()),
            sweep_interval: Duration::from_secs(env_u64("RATE_WINDOW_SWEEP_SECONDS", 60).max(1)),
            policy: policy_from_env(),
        })
    }
}

fn policy_from_env() -> ModerationPolicy {
    let defaults = ModerationPolicy::default();

    ModerationPolicy {
        warn_timeout_threshold: env_u32("WARN_TIMEOUT_THRESHOLD", defaults.warn_timeout_threshold),
        warn_ban_threshold: env_u32("WARN_BAN_THRESHOLD", defaults.warn_ban_threshold),
        warn_timeout: sanction_length(env_u64(
            "WARN_TIMEOUT_SECONDS",
            defaults.warn_timeout.as_secs(),
        )),
        spam_window: Duration::from_secs(
            env_u64("SPAM_WINDOW_SECONDS", defaults.spam_window.as_secs()).max(1),
        ),
        spam_message_threshold: usize::try_from(env_u64(
            "SPAM_MESSAGE_THRESHOLD",
            defaults.spam_message_threshold as u64,
        ))
        .unwrap_or(defaults.spam_message_threshold)
        .max(1),
        spam_timeout: sanction_length(env_u64(
            "SPAM_TIMEOUT_SECONDS",
            defaults.spam_timeout.as_secs(),
        )),
        mute_role_name: env_string("MUTE_ROLE_NAME").unwrap_or(defaults.mute_role_name),
        ..defaults
    }
}

/// Platform timeouts cannot run past the sanction ceiling.
fn sanction_length(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(1, MAX_SANCTION_SECONDS))
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    parse_bool(env::var(key).ok().as_deref(), default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    parse_u64(env::var(key).ok().as_deref(), default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    u32::try_from(env_u64(key, u64::from(default))).unwrap_or(default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

fn parse_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use warden_utils::parse::MAX_SANCTION_SECONDS;

    use super::{parse_bool, parse_u64, sanction_length};

    #[test]
    fn booleans_accept_common_spellings() {
        assert!(parse_bool(Some(" Yes "), false));
        assert!(parse_bool(Some("1"), false));
        assert!(!parse_bool(Some("off"), true));
        assert!(parse_bool(None, true));
    }

    #[test]
    fn numbers_fall_back_on_garbage() {
        assert_eq!(parse_u64(Some(" 42 "), 7), 42);
        assert_eq!(parse_u64(Some("-3"), 7), 7);
        assert_eq!(parse_u64(None, 7), 7);
    }

    #[test]
    fn sanction_lengths_are_capped() {
        assert_eq!(
            sanction_length(u64::MAX),
            Duration::from_secs(MAX_SANCTION_SECONDS)
        );
        assert_eq!(sanction_length(0), Duration::from_secs(1));
        assert_eq!(sanction_length(600), Duration::from_secs(600));
    }
}
