use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{events::Event, flows::Dispatcher, ports::UpdateSource};

/// Fetch/dispatch loop over an [`UpdateSource`].
///
/// Updates are processed one at a time in arrival order. A failing event is
/// logged and skipped; it never blocks the ones after it.
pub struct Consumer {
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    batch_size: u8,
    idle_backoff: Duration,
}

impl Consumer {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        dispatcher: Arc<Dispatcher>,
        batch_size: u8,
        idle_backoff: Duration,
    ) -> Self {
        Self {
            source,
            dispatcher,
            batch_size,
            idle_backoff,
        }
    }

    /// Run until `cancel` fires. Returns the next cursor.
    ///
    /// Shutdown does not drain: updates fetched but not yet dispatched are
    /// left unconfirmed and will be delivered again.
    pub async fn run(&self, cancel: CancellationToken) -> i64 {
        let mut cursor = 0i64;
        info!(batch_size = self.batch_size, "consumer started");

        'outer: loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = self.source.fetch(cursor, self.batch_size) => res,
            };

            let updates = match fetched {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("failed to fetch updates: {e}");
                    if !self.backoff(&cancel).await {
                        break;
                    }
                    continue;
                }
            };

            if updates.is_empty() {
                if !self.backoff(&cancel).await {
                    break;
                }
                continue;
            }

            for update in updates {
                if cancel.is_cancelled() {
                    break 'outer;
                }
                let id = update.id;
                cursor = cursor.max(id + 1);

                let Some(event) = Event::from_raw(update) else {
                    debug!(update = id, "skipping update without chat");
                    continue;
                };
                let user = event.user_id.0;
                if let Err(e) = self.dispatcher.dispatch(event).await {
                    error!(update = id, user, "failed to process event: {e}");
                }
            }
        }

        info!(cursor, "consumer stopped");
        cursor
    }

    /// Sleep for the idle back-off. Returns `false` if cancelled meanwhile.
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.idle_backoff) => true,
        }
    }
}
