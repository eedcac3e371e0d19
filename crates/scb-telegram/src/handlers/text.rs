use std::sync::Arc;

use teloxide::prelude::*;

use scb_core::{audit::AuditEvent, domain::ChatId};

use crate::router::AppState;

use super::{reject, reply, username};

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user = username(&msg);
    save_text(&state, ChatId(msg.chat.id.0), user.as_deref(), text).await;
    Ok(())
}

pub(crate) async fn save_text(state: &AppState, chat_id: ChatId, username: Option<&str>, text: &str) {
    match state.aggregator.add_text(chat_id, text).await {
        Ok(_) => {
            state.audit(AuditEvent::text_saved(chat_id, username, text.len() as u64));
            reply(
                state,
                chat_id,
                "Saved your text. Send /clean when you're ready to process all stored items.",
            )
            .await;
        }
        Err(r) => reject(state, chat_id, username, &r).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{state, Sent};

    #[tokio::test]
    async fn text_is_saved_then_refused_while_merging() {
        let (state, sent) = state("");
        let chat = ChatId(5);

        save_text(&state, chat, None, "a.example.com").await;
        assert_eq!(state.aggregator.status(chat).await.pending_texts, 1);
        assert!(matches!(&sent.take()[..], [Sent::Html(s)] if s.starts_with("Saved your text")));

        state.aggregator.start_merge(chat).await.unwrap();
        save_text(&state, chat, None, "b.example.com").await;
        assert_eq!(state.aggregator.status(chat).await.pending_texts, 1);
        assert!(matches!(&sent.take()[..], [Sent::Html(s)] if s.starts_with("You're in merge mode")));
    }
}
