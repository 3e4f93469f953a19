use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use drill_core::{
    config::Config,
    consumer::Consumer,
    deadline::{Deadline, DeadlineMessenger, DeadlineStore},
    flows::Dispatcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::{DebtStore, SystemClock},
    session::MemorySessionStore,
    store::MemoryDebtStore,
};

use crate::{updates::TelegramUpdates, TelegramMessenger};

/// Extra time the HTTP client waits on top of the long-poll timeout.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(cfg.poll_timeout + HTTP_TIMEOUT_MARGIN)
        .build()?;
    let bot = Bot::with_client(cfg.telegram_bot_token.clone(), client);

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), env = ?cfg.env, "drill started"),
        Err(e) => warn!("get_me failed, continuing anyway: {e}"),
    }

    let cancel = CancellationToken::new();
    let deadline = Deadline::new(cfg.outbound_timeout, cancel.clone());

    // Deadline wraps throttling: waiting for a send slot counts against the turn.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let throttled: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));
    let messenger: Arc<dyn MessagingPort> =
        Arc::new(DeadlineMessenger::new(throttled, deadline.clone()));

    let store: Arc<dyn DebtStore> = match &cfg.debt_store_file {
        Some(path) => {
            info!(path = %path.display(), "using debt snapshot file");
            Arc::new(MemoryDebtStore::open(path).await?)
        }
        None => Arc::new(MemoryDebtStore::new()),
    };
    let store: Arc<dyn DebtStore> = Arc::new(DeadlineStore::new(store, deadline));

    let dispatcher = Arc::new(Dispatcher::with_default_flows(
        Arc::new(MemorySessionStore::new()),
        messenger,
        store,
        Arc::new(SystemClock),
        cfg.welcome_media.clone(),
    ));

    let source = Arc::new(TelegramUpdates::new(bot, cfg.poll_timeout));
    let consumer = Consumer::new(source, dispatcher, cfg.batch_size, cfg.idle_backoff);

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown requested");
            cancel.cancel();
        }
    });

    let cursor = consumer.run(cancel).await;
    info!(cursor, "drill stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
