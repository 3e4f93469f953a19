use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Deployment environment. Production switches logging to JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Dev,
    Prod,
}

impl AppEnv {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "local" => Ok(AppEnv::Local),
            "dev" => Ok(AppEnv::Dev),
            "prod" => Ok(AppEnv::Prod),
            other => Err(Error::Config(format!(
                "APP_ENV must be one of local, dev, prod (got {other:?})"
            ))),
        }
    }

    pub fn is_production(self) -> bool {
        self == AppEnv::Prod
    }
}

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub env: AppEnv,
    pub debug: bool,

    // Polling
    pub batch_size: u8,
    pub poll_timeout: Duration,
    pub idle_backoff: Duration,

    // Deadline applied to every outbound and store call.
    pub outbound_timeout: Duration,

    pub debt_store_file: Option<PathBuf>,
    pub welcome_media: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let env = AppEnv::parse(&lookup("APP_ENV").unwrap_or_default())?;
        let debug = lookup("DEBUG").map(|v| parse_bool(&v)).unwrap_or(false);

        let batch_size = parse_num::<u8>(&lookup, "BATCH_SIZE")?.unwrap_or(100);
        if !(1..=100).contains(&batch_size) {
            return Err(Error::Config(format!(
                "BATCH_SIZE must be within 1..=100 (got {batch_size})"
            )));
        }

        let poll_timeout =
            Duration::from_secs(parse_num::<u64>(&lookup, "POLL_TIMEOUT_SECS")?.unwrap_or(30));
        let idle_backoff =
            Duration::from_millis(parse_num::<u64>(&lookup, "IDLE_BACKOFF_MS")?.unwrap_or(1_000));
        let outbound_timeout = Duration::from_millis(
            parse_num::<u64>(&lookup, "OUTBOUND_TIMEOUT_MS")?.unwrap_or(10_000),
        );

        // An explicitly empty value disables the snapshot file.
        let debt_store_file = match lookup("DEBT_STORE_FILE") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v.trim())),
            None => Some(PathBuf::from("/tmp/drill-debts.json")),
        };
        let welcome_media = PathBuf::from(
            lookup("WELCOME_MEDIA").unwrap_or_else(|| "resources/static/welcome.jpg".to_string()),
        );

        Ok(Self {
            telegram_bot_token,
            env,
            debug,
            batch_size,
            poll_timeout,
            idle_backoff,
            outbound_timeout,
            debt_store_file,
            welcome_media,
        })
    }
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

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_num<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a number (got {v:?})"))),
    }
}
