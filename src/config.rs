use std::env;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

fn get_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_env_u64(key: &str, default: u64) -> Result<u64> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<u64>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_i32(key: &str, default: i32) -> Result<i32> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<i32>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_usize(key: &str, default: usize) -> Result<usize> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<usize>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_u16(key: &str, default: u16) -> Result<u16> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => parse_u16(key, &v),
    }
}

fn parse_u16(key: &str, v: &str) -> Result<u16> {
    let n = v
        .parse::<u64>()
        .map_err(|e| anyhow!("{key} invalid int: {e}"))?;
    u16::try_from(n).map_err(|_| anyhow!("{key} invalid port: {n} is out of range"))
}

fn get_env_string(key: &str, default: &str) -> String {
    get_env(key).unwrap_or_else(|| default.to_string())
}

/// Split a comma separated list, dropping blanks. Order is kept.
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub run_mode: String, // once|serve

    // Snapshot source
    #[serde(skip_serializing)]
    pub finmind_token: Option<String>,
    pub finmind_base_url: String,

    // Historical source
    pub yahoo_base_url: String,
    pub history_range: String,
    pub history_suffixes: Vec<String>,

    // Analysis
    pub watchlist_path: String,
    pub top_k: usize,
    pub ma_period: usize,
    pub market_utc_offset_hours: i32,

    // Network
    pub http_timeout_secs: u64,

    // Serve mode
    pub refresh_secs: u64,
    pub server_host: String,
    pub server_port: u16,
}

impl Settings {
    /// Read settings from the environment. Callers apply any overrides and
    /// then `validate()`.
    pub fn load() -> Result<Self> {
        let run_mode = get_env_string("RUN_MODE", "once").to_lowercase();

        let s = Self {
            run_mode,
            finmind_token: get_env("FINMIND_TOKEN"),
            finmind_base_url: get_env_string("FINMIND_BASE_URL", "https://api.finmindtrade.com"),
            yahoo_base_url: get_env_string("YAHOO_BASE_URL", "https://query1.finance.yahoo.com"),
            history_range: get_env_string("HISTORY_RANGE", "1mo"),
            history_suffixes: parse_list(&get_env_string("HISTORY_SUFFIXES", ".TW,.TWO")),
            watchlist_path: get_env_string("WATCHLIST_PATH", "./watchlist.txt"),
            top_k: get_env_usize("TOP_K", 300)?,
            ma_period: get_env_usize("MA_PERIOD", 5)?,
            market_utc_offset_hours: get_env_i32("MARKET_UTC_OFFSET_HOURS", 8)?,
            http_timeout_secs: get_env_u64("HTTP_TIMEOUT_SECS", 15)?,
            refresh_secs: get_env_u64("REFRESH_SECS", 300)?,
            server_host: get_env_string("SERVER_HOST", "127.0.0.1"),
            server_port: get_env_u16("SERVER_PORT", 8000)?,
        };

        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.run_mode.as_str(), "once" | "serve") {
            return Err(anyhow!("RUN_MODE must be once|serve (got {})", self.run_mode));
        }
        if self.top_k < 1 {
            return Err(anyhow!("TOP_K must be >= 1 (got {})", self.top_k));
        }
        if self.ma_period < 1 {
            return Err(anyhow!("MA_PERIOD must be >= 1 (got {})", self.ma_period));
        }
        if !(-12..=14).contains(&self.market_utc_offset_hours) {
            return Err(anyhow!(
                "MARKET_UTC_OFFSET_HOURS must be within -12..=14 (got {})",
                self.market_utc_offset_hours
            ));
        }
        if self.http_timeout_secs < 1 {
            return Err(anyhow!(
                "HTTP_TIMEOUT_SECS must be >= 1 (got {})",
                self.http_timeout_secs
            ));
        }
        if self.refresh_secs < 1 {
            return Err(anyhow!("REFRESH_SECS must be >= 1 (got {})", self.refresh_secs));
        }
        if self.history_suffixes.is_empty() {
            return Err(anyhow!("HISTORY_SUFFIXES must name at least one suffix"));
        }
        if self.watchlist_path.trim().is_empty() {
            return Err(anyhow!("WATCHLIST_PATH is empty"));
        }
        Ok(())
    }
}
