//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;
use tracing::warn;

use super::{retention::Retention, types::Res};

/// Hard upper bound for `max_messages`.
pub const MAX_MESSAGES_LIMIT: i64 = 100;

/// Hard upper bound for `storage_days`.
pub const STORAGE_DAYS_LIMIT: i64 = 30;

/// Default number of records returned by a query
fn default_max_messages() -> i64 {
    25
}

/// Default retention window, in days
fn default_storage_days() -> i64 {
    3
}

/// Default database endpoint (a local on-disk store)
fn default_db_endpoint() -> String {
    "surrealkv://.hidden/whoasked".to_string()
}

/// Default prefix for the in-channel query keyword
fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_filter_by_channel() -> bool {
    true
}

/// Configuration for the whoasked bot.
///
/// Cheap to clone; every component receives its own handle.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Slack app-level token used for Socket Mode (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Database endpoint URL (`DB_ENDPOINT`), e.g. `mem://` or `surrealkv://path`.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`), only needed for remote databases.
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: Option<String>,
    /// Most records returned per query, and kept per user (`MAX_MESSAGES`).
    /// Clamped to `1..=100`.
    #[serde(default = "default_max_messages")]
    pub max_messages: i64,
    /// Days a record stays queryable (`STORAGE_DAYS`).
    /// Clamped to `1..=30`.
    #[serde(default = "default_storage_days")]
    pub storage_days: i64,
    /// Prefix for the in-channel query keyword (`COMMAND_PREFIX`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Only list records from the channel the query was sent in (`FILTER_BY_CHANNEL`).
    #[serde(default = "default_filter_by_channel")]
    pub filter_by_channel: bool,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
            db_endpoint: default_db_endpoint(),
            db_username: None,
            db_password: None,
            max_messages: default_max_messages(),
            storage_days: default_storage_days(),
            command_prefix: default_command_prefix(),
            filter_by_channel: default_filter_by_channel(),
        }
    }
}

impl Config {
    /// Wraps the raw settings, clamping the numeric ones into range.
    pub fn new(mut inner: ConfigInner) -> Self {
        let max_messages = inner.max_messages.clamp(1, MAX_MESSAGES_LIMIT);
        if max_messages != inner.max_messages {
            warn!("`max_messages` of {} is out of range, using {}.", inner.max_messages, max_messages);
        }

        let storage_days = inner.storage_days.clamp(1, STORAGE_DAYS_LIMIT);
        if storage_days != inner.storage_days {
            warn!("`storage_days` of {} is out of range, using {}.", inner.storage_days, storage_days);
        }

        inner.max_messages = max_messages;
        inner.storage_days = storage_days;

        Self { inner: Arc::new(inner) }
    }

    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let file = explicit_path.map(std::path::Path::to_path_buf).or_else(|| {
            let fallback = std::path::PathBuf::from(".hidden/config.toml");
            fallback.exists().then_some(fallback)
        });

        Self::load_from(config::Environment::default().prefix("WHOASKED").try_parsing(true), file.as_deref())
    }

    /// Loads from the given environment source, layered under an optional TOML file.
    fn load_from(env: config::Environment, file: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(env);

        if let Some(p) = file {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        }

        let inner: ConfigInner = cfg.build()?.try_deserialize()?;

        if inner.slack_app_token.is_empty() || inner.slack_bot_token.is_empty() {
            return Err(anyhow::anyhow!("Both `slack_app_token` and `slack_bot_token` must be set."));
        }

        Ok(Self::new(inner))
    }

    /// The retention policy described by this configuration.
    pub fn retention(&self) -> Retention {
        // Both values are clamped to small positive ranges in `Config::new`.
        Retention::new(self.max_messages as usize, self.storage_days as u32)
    }

    /// The full in-channel query trigger, e.g. `!whoasked`.
    pub fn query_trigger(&self) -> String {
        format!("{}{}", self.command_prefix, super::replies::QUERY_KEYWORD)
    }
}

// Tests.
