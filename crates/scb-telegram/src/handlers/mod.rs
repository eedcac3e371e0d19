//! Telegram update handlers.
//!
//! Each handler is a thin adapter: it pulls what it needs out of the update,
//! calls the core [`Aggregator`](scb_core::aggregator::Aggregator), and turns
//! the result into replies through the messaging port.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::warn;

use scb_core::{
    audit::AuditEvent, domain::ChatId, formatting::escape_html, session::Rejection,
};

use crate::router::AppState;
mod callback;
mod commands;
mod document;
mod text;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    let _guard = state.chat_locks.lock_chat(chat_id).await;

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(msg, state.clone()).await;
        }
        return text::handle_text(msg, state.clone()).await;
    }

    if msg.document().is_some() {
        return document::handle_document(msg, state.clone()).await;
    }

    reply(
        &state,
        ChatId(chat_id),
        "Send text or upload a <code>.txt</code> file. /help shows how it works.",
    )
    .await;
    Ok(())
}

fn username(msg: &Message) -> Option<String> {
    msg.from().and_then(|u| u.username.clone())
}

pub(crate) async fn reply(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat_id, html).await {
        warn!(chat_id = chat_id.0, "reply failed: {e}");
    }
}

/// Reply with the rejection text and record it.
pub(crate) async fn reject(
    state: &AppState,
    chat_id: ChatId,
    username: Option<&str>,
    rejection: &Rejection,
) {
    state.audit(AuditEvent::rejected(
        chat_id,
        username,
        &format!("{rejection:?}"),
    ));
    reply(state, chat_id, &escape_html(&rejection.to_string())).await;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use scb_core::{
        aggregator::Aggregator,
        artifact::{Artifact, UrlOutput},
        config::Config,
        domain::{ChatId, FileRef, MessageId, MessageRef},
        errors::Error,
        messaging::{port::MessagingPort, types::InlineKeyboard},
        ports::FileFetcher,
        session::{Limits, Mode},
        suffix::PslLookup,
        Result,
    };

    use crate::router::{AppState, ChatLocks};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Sent {
        Html(String),
        Keyboard(String, InlineKeyboard),
        Edit(String, InlineKeyboard),
        Document(Artifact, Option<InlineKeyboard>),
        Answer(Option<String>),
    }

    #[derive(Default)]
    pub struct FakeMessenger {
        pub sent: Mutex<Vec<Sent>>,
    }

    impl FakeMessenger {
        pub fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }

        fn push(&self, chat_id: ChatId, s: Sent) -> MessageRef {
            let mut sent = self.sent.lock().unwrap();
            sent.push(s);
            MessageRef {
                chat_id,
                message_id: MessageId(sent.len() as i32),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            Ok(self.push(chat_id, Sent::Html(html.to_string())))
        }

        async fn send_html_with_keyboard(
            &self,
            chat_id: ChatId,
            html: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            Ok(self.push(chat_id, Sent::Keyboard(html.to_string(), keyboard)))
        }

        async fn edit_html_with_keyboard(
            &self,
            msg: MessageRef,
            html: &str,
            keyboard: InlineKeyboard,
        ) -> Result<()> {
            self.push(msg.chat_id, Sent::Edit(html.to_string(), keyboard));
            Ok(())
        }

        async fn send_document(
            &self,
            chat_id: ChatId,
            artifact: &Artifact,
            keyboard: Option<InlineKeyboard>,
        ) -> Result<MessageRef> {
            Ok(self.push(chat_id, Sent::Document(artifact.clone(), keyboard)))
        }

        async fn answer_callback_query(
            &self,
            _callback_id: &str,
            text: Option<&str>,
        ) -> Result<()> {
            self.push(ChatId(0), Sent::Answer(text.map(str::to_string)));
            Ok(())
        }
    }

    /// Serves every file id as the same body, except ids starting with `bad`.
    pub struct FakeFetcher(pub &'static str);

    #[async_trait]
    impl FileFetcher for FakeFetcher {
        async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>> {
            if file.id.starts_with("bad") {
                return Err(Error::External("gone".to_string()));
            }
            Ok(self.0.as_bytes().to_vec())
        }
    }

    pub fn state(body: &'static str) -> (Arc<AppState>, Arc<FakeMessenger>) {
        let cfg = Config {
            telegram_bot_token: "test".to_string(),
            telegram_retry_attempts: 0,
            limits: Limits::default(),
            default_mode: Mode::Apex,
            url_output: UrlOutput::Sites,
            audit_log_path: None,
            audit_log_json: false,
        };
        let aggregator = Aggregator::new(&cfg, Arc::new(PslLookup));
        let messenger = Arc::new(FakeMessenger::default());
        let state = AppState {
            cfg: Arc::new(cfg),
            aggregator: Arc::new(aggregator),
            messenger: messenger.clone(),
            fetcher: Arc::new(FakeFetcher(body)),
            chat_locks: Arc::new(ChatLocks::default()),
            audit: None,
        };
        (Arc::new(state), messenger)
    }

    pub fn txt(id: &str, name: &str) -> FileRef {
        FileRef {
            id: id.to_string(),
            name: name.to_string(),
            size: 64,
            mime: Some("text/plain".to_string()),
        }
    }
}
