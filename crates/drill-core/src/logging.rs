use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, errors::Error, Result};

/// Initialize tracing for the bot.
///
/// `RUST_LOG` overrides the default filter. Production emits JSON lines.
pub fn init(service_name: &str, cfg: &Config) -> Result<()> {
    let level = if cfg.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,drill={level},drill_core={level},drill_telegram={level},{service_name}={level}"
        ))
    });

    let res = if cfg.env.is_production() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(true)
            .try_init()
    };

    res.map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))
}
