use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::anyhow;

use crate::{leaderboard::LabelSource, telegramclient::DEFAULT_API_URL};

const DEFAULT_DB_PATH: &str = "data/data.db";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub database_path: String,
    pub poll_timeout_secs: u64,
    pub lookup_timeout: Duration,
    pub lookup_concurrency: usize,
    /// Label leaderboard entries with a live @username lookup instead of the stored name
    pub resolve_names: bool,
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<bool, anyhow::Error> {
    match lookup(key).map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(anyhow!("{} should be a boolean, got {:?}", key, other)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let telegram_token = lookup("TG_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(anyhow!("please set TG_TOKEN"))?;

        let lookup_concurrency = parse_or(&lookup, "LOOKUP_CONCURRENCY", DEFAULT_LOOKUP_CONCURRENCY)?;
        if lookup_concurrency == 0 {
            return Err(anyhow!("LOOKUP_CONCURRENCY must be at least 1"));
        }

        Ok(Self {
            telegram_token,
            telegram_api_url: lookup("TG_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            database_path: lookup("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            poll_timeout_secs: parse_or(&lookup, "POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS)?,
            lookup_timeout: Duration::from_secs(parse_or(
                &lookup,
                "LOOKUP_TIMEOUT_SECS",
                DEFAULT_LOOKUP_TIMEOUT_SECS,
            )?),
            lookup_concurrency,
            resolve_names: parse_flag(&lookup, "RESOLVE_NAMES")?,
        })
    }

    pub fn label_source(&self) -> LabelSource {
        if self.resolve_names {
            LabelSource::Directory {
                timeout: self.lookup_timeout,
                concurrency: self.lookup_concurrency,
            }
        } else {
            LabelSource::Stored
        }
    }
}
