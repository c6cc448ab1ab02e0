use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use chronicle_gateway::AllowList;
use chronicle_queue::ReplayConfig;
use chronicle_types::Snowflake;

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub queue_path: PathBuf,
    pub guild_id: Snowflake,
    pub channels: Vec<Snowflake>,
    pub replay: ReplayConfig,
    /// `-` for stdin, otherwise a path to a JSONL event file.
    pub events: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let guild_id: Snowflake = get("CHRONICLE_GUILD_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("CHRONICLE_GUILD_ID is required"))?
            .trim()
            .into();
        if guild_id.is_absent() {
            return Err(anyhow!("CHRONICLE_GUILD_ID must name a real guild, not {}", Snowflake::ABSENT));
        }

        let channels: Vec<Snowflake> = get("CHRONICLE_CHANNELS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Snowflake::from)
            .collect();
        if channels.is_empty() {
            return Err(anyhow!("CHRONICLE_CHANNELS must list at least one channel id"));
        }
        if channels.iter().any(Snowflake::is_absent) {
            return Err(anyhow!("CHRONICLE_CHANNELS must not contain {}", Snowflake::ABSENT));
        }

        let secs = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(v) => v.trim().parse().with_context(|| format!("{} must be a number of seconds", key)),
                None => Ok(default),
            }
        };

        let replay = ReplayConfig {
            interval: Duration::from_secs(secs("CHRONICLE_DRAIN_INTERVAL_SECS", 3600)?),
            apply_timeout: Duration::from_secs(secs("CHRONICLE_APPLY_TIMEOUT_SECS", 30)?),
            stall_warn_attempts: get_or("CHRONICLE_STALL_WARN_ATTEMPTS", "24")
                .trim()
                .parse()
                .context("CHRONICLE_STALL_WARN_ATTEMPTS must be a number")?,
        };
        if replay.interval.is_zero() {
            return Err(anyhow!("CHRONICLE_DRAIN_INTERVAL_SECS must be greater than zero"));
        }

        Ok(Self {
            db_path: get_or("CHRONICLE_DB_PATH", "chronicle.db").into(),
            queue_path: get_or("CHRONICLE_QUEUE_PATH", "chronicle-queue.json").into(),
            guild_id,
            channels,
            replay,
            events: get_or("CHRONICLE_EVENTS", "-"),
            host: get_or("CHRONICLE_HOST", "127.0.0.1"),
            port: get_or("CHRONICLE_PORT", "3300")
                .trim()
                .parse()
                .context("CHRONICLE_PORT must be a port number")?,
        })
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.guild_id.clone(), self.channels.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup(&[
            ("CHRONICLE_GUILD_ID", "1"),
            ("CHRONICLE_CHANNELS", "10, 11,,"),
        ]))
        .unwrap();

        assert_eq!(config.guild_id.as_str(), "1");
        assert_eq!(config.channels, vec![Snowflake::from("10"), Snowflake::from("11")]);
        assert_eq!(config.replay.interval, Duration::from_secs(3600));
        assert_eq!(config.replay.apply_timeout, Duration::from_secs(30));
        assert_eq!(config.queue_path, PathBuf::from("chronicle-queue.json"));
        assert_eq!(config.events, "-");
        assert_eq!(config.port, 3300);
    }

    #[test]
    fn guild_and_channels_are_required() {
        assert!(Config::from_lookup(lookup(&[("CHRONICLE_CHANNELS", "10")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CHRONICLE_GUILD_ID", "1")])).is_err());
    }

    #[test]
    fn absent_ids_are_rejected() {
        assert!(Config::from_lookup(lookup(&[
            ("CHRONICLE_GUILD_ID", "0"),
            ("CHRONICLE_CHANNELS", "10"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("CHRONICLE_GUILD_ID", "1"),
            ("CHRONICLE_CHANNELS", "10,0"),
        ]))
        .is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let base = [("CHRONICLE_GUILD_ID", "1"), ("CHRONICLE_CHANNELS", "10")];

        let mut bad_interval = base.to_vec();
        bad_interval.push(("CHRONICLE_DRAIN_INTERVAL_SECS", "hourly"));
        assert!(Config::from_lookup(lookup(&bad_interval)).is_err());

        let mut zero_interval = base.to_vec();
        zero_interval.push(("CHRONICLE_DRAIN_INTERVAL_SECS", "0"));
        assert!(Config::from_lookup(lookup(&zero_interval)).is_err());
    }
}
