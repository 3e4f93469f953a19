use std::sync::Arc;

use drill_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), drill_core::Error> {
    let cfg = Arc::new(Config::load()?);
    drill_core::logging::init("drill", &cfg)?;

    drill_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| drill_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
