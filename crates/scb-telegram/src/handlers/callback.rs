use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use scb_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{parse_mode_callback, InlineKeyboard},
    session::Mode,
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let target = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });
    let data = q.data.clone().unwrap_or_default();
    on_mode_button(&state, &q.id, target, &data).await;
    Ok(())
}

/// The query is always answered. Unknown data or a missing message is a no-op.
/// A mode switch waits for the chat lock so it cannot land mid-/clean.
pub(crate) async fn on_mode_button(
    state: &AppState,
    callback_id: &str,
    target: Option<MessageRef>,
    data: &str,
) {
    if let Err(e) = state.messenger.answer_callback_query(callback_id, None).await {
        debug!("answer_callback_query failed: {e}");
    }

    let (Some(target), Some(mode)) = (target, parse_mode_callback(data)) else {
        return;
    };
    let _guard = state.chat_locks.lock_chat(target.chat_id.0).await;
    let mode = match state.aggregator.set_mode(target.chat_id, mode.as_str()).await {
        Ok(m) => m,
        Err(_) => return,
    };

    // Editing fails when the button sits under a document or the mode did
    // not change; neither needs a reply.
    if let Err(e) = state
        .messenger
        .edit_html_with_keyboard(target, &mode_set_text(mode), InlineKeyboard::mode_picker(mode))
        .await
    {
        debug!(chat_id = target.chat_id.0, "mode message not edited: {e}");
    }
}

fn mode_set_text(mode: Mode) -> String {
    format!(
        "✅ Mode set to <b>{}</b>.\n\nUpload files or send text, then /clean.",
        mode.as_str().to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{state, Sent};
    use std::time::Duration;

    fn msg_ref(chat: i64) -> Option<MessageRef> {
        Some(MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(1),
        })
    }

    #[tokio::test]
    async fn mode_button_switches_and_edits() {
        let (state, sent) = state("");
        on_mode_button(&state, "cb", msg_ref(3), "mode:host").await;

        assert_eq!(state.aggregator.mode(ChatId(3)).await, Mode::Host);
        let sent = sent.take();
        assert_eq!(sent[0], Sent::Answer(None));
        assert_eq!(
            sent[1],
            Sent::Edit(mode_set_text(Mode::Host), InlineKeyboard::mode_picker(Mode::Host))
        );
    }

    #[tokio::test]
    async fn unknown_data_is_only_answered() {
        let (state, sent) = state("");
        on_mode_button(&state, "cb", msg_ref(3), "mode:weird").await;
        on_mode_button(&state, "cb", None, "mode:host").await;

        assert_eq!(state.aggregator.mode(ChatId(3)).await, Mode::Apex);
        assert_eq!(sent.take(), vec![Sent::Answer(None), Sent::Answer(None)]);
    }

    #[tokio::test]
    async fn mode_switch_waits_for_the_chat_lock() {
        let (state, _sent) = state("");
        let guard = state.chat_locks.lock_chat(3).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            on_mode_button(&state, "cb", msg_ref(3), "mode:host"),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(state.aggregator.mode(ChatId(3)).await, Mode::Apex);

        // other chats are unaffected
        on_mode_button(&state, "cb", msg_ref(4), "mode:host").await;
        assert_eq!(state.aggregator.mode(ChatId(4)).await, Mode::Host);

        drop(guard);
        on_mode_button(&state, "cb", msg_ref(3), "mode:host").await;
        assert_eq!(state.aggregator.mode(ChatId(3)).await, Mode::Host);
    }
}
