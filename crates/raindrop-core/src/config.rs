use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::Snowflake, errors::Error, Result};

/// Typed runtime configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Longest single message sent to Telegram; longer replies are split.
    pub telegram_safe_limit: usize,

    // Persisted state
    pub data_file: PathBuf,
    pub defaults_file: Option<PathBuf>,
    /// Seeded into the built-in defaults when no data file is usable.
    pub default_admins: Vec<Snowflake>,
    pub persist_on_mutation: bool,

    // Stream behaviour
    /// Subscribe/unsubscribe only pass the global gate, not the stream's own.
    pub open_subscriptions: bool,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            telegram_safe_limit: 4000,
            data_file: PathBuf::from("data/data.json"),
            defaults_file: None,
            default_admins: Vec::new(),
            persist_on_mutation: true,
            open_subscriptions: true,
            audit_log_path: None,
            audit_log_json: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let defaults = Self::default();

        Ok(Self {
            telegram_bot_token,
            telegram_safe_limit: env_usize("TELEGRAM_SAFE_LIMIT")
                .unwrap_or(defaults.telegram_safe_limit),
            data_file: env_path("RAINDROP_DATA_FILE").unwrap_or(defaults.data_file),
            defaults_file: env_path("RAINDROP_DEFAULTS_FILE"),
            default_admins: parse_csv_ids(env_str("RAINDROP_ADMINS")),
            persist_on_mutation: env_bool("RAINDROP_PERSIST")
                .unwrap_or(defaults.persist_on_mutation),
            open_subscriptions: env_bool("RAINDROP_OPEN_SUBSCRIPTIONS")
                .unwrap_or(defaults.open_subscriptions),
            audit_log_path: env_path("AUDIT_LOG_PATH"),
            audit_log_json: env_bool("AUDIT_LOG_JSON").unwrap_or(defaults.audit_log_json),
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_csv_ids(v: Option<String>) -> Vec<Snowflake> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(Snowflake::from)
        .collect()
}
