use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use scb_core::{
    aggregator::Aggregator,
    audit::{AuditEvent, AuditLogger},
    config::Config,
    messaging::port::MessagingPort,
    ports::FileFetcher,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub aggregator: Arc<Aggregator>,
    pub messenger: Arc<dyn MessagingPort>,
    pub fetcher: Arc<dyn FileFetcher>,
    pub chat_locks: Arc<ChatLocks>,
    pub audit: Option<Arc<AuditLogger>>,
}

impl AppState {
    /// Best-effort audit write; failures are logged and otherwise ignored.
    pub fn audit(&self, event: AuditEvent) {
        let Some(log) = &self.audit else {
            return;
        };
        if let Err(e) = log.write(event) {
            warn!(path = %log.path().display(), "audit write failed: {e}");
        }
    }
}

/// Serializes update handling per chat so replies keep arrival order.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>, aggregator: Arc<Aggregator>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "site cleaner bot started"),
        Err(e) => warn!("get_me failed: {e}"),
    }
    info!(
        mode = %cfg.default_mode,
        max_file_bytes = cfg.limits.max_file_bytes,
        max_merge_files = cfg.limits.max_merge_files,
        "session defaults"
    );

    let telegram = Arc::new(TelegramMessenger::new(
        bot.clone(),
        cfg.telegram_retry_attempts,
    ));
    let messenger: Arc<dyn MessagingPort> = telegram.clone();
    let fetcher: Arc<dyn FileFetcher> = telegram;

    let audit = cfg.audit_log_path.clone().map(|path| {
        info!(path = %path.display(), json = cfg.audit_log_json, "audit log enabled");
        Arc::new(AuditLogger::new(path, cfg.audit_log_json))
    });

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        aggregator,
        messenger,
        fetcher,
        chat_locks: Arc::new(ChatLocks::default()),
        audit,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn chat_locks_serialize_one_chat_only() {
        let locks = ChatLocks::default();
        let held = locks.lock_chat(1).await;

        // Another chat is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(2)).await;
        assert!(other.is_ok());

        // The same chat waits until the guard drops.
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(same.is_err());
        drop(held);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(same.is_ok());
    }
}
