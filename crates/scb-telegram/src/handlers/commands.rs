use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use scb_core::{
    aggregator::Outcome,
    artifact::ArtifactKind,
    audit::AuditEvent,
    domain::ChatId,
    messaging::types::InlineKeyboard,
    session::{Mode, Trigger},
};

use crate::router::AppState;

use super::{reject, reply, username};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn welcome_text(mode: Mode) -> String {
    format!(
        "👋 <b>Welcome to the Site Cleaner Bot (Manual Clean Mode)!</b>\n\n\
Upload text or <code>.txt</code> files and I will store them. When you're ready send /clean to process all stored items.\n\n\
<b>Modes:</b>\n\
🔵 <b>Apex</b>: removes subdomains (default)\n\
🟣 <b>Host</b>: keeps subdomains\n\n\
Current mode: <b>{}</b>\n\n\
Use /settings to change mode or /help for more.",
        mode.as_str().to_uppercase()
    )
}

const HELP_TEXT: &str = "📖 <b>Manual Clean Mode: how to use</b>\n\n\
1) Send any text message(s) containing URLs.\n\
2) Or upload one or more <code>.txt</code> files (as documents).\n\
3) When ready, send /clean. I will process everything you sent and return results.\n\n\
<b>Results:</b>\n\
• Only URLs found: a cleaned URLs file.\n\
• Only credit cards found: a cards file.\n\
• Both found: URLs first, then cards (cards contain full numbers).\n\n\
<b>Commands:</b>\n\
• /clean: process all pending stored items now.\n\
• /pending: show how many pending texts/files you have.\n\
• /clear_pending: discard stored items.\n\
• /mode <code>apex</code>|<code>host</code>, /settings: choose how URLs are reduced.\n\
• /merge, upload files, then /done: separate merge workflow. /merge_cancel stops it.\n\n\
⚠️ Security: card files are sensitive. Keep them private.";

const MERGE_STARTED_TEXT: &str = "🔀 <b>Merge mode started</b>\n\n\
Upload two or more <code>.txt</code> files (documents). When finished send /done to merge and process.\n\
To cancel, send /merge_cancel.";

fn mode_set_text(mode: Mode) -> String {
    format!("✅ Mode set to <b>{}</b>.", mode.as_str().to_uppercase())
}

fn nothing_found_text(trigger: Trigger) -> &'static str {
    match trigger {
        Trigger::Clean => "No valid URLs or credit card numbers found in your pending items.",
        Trigger::Done => "No site URLs or credit cards found in merged files.",
    }
}

fn unreadable_text(trigger: Trigger) -> &'static str {
    match trigger {
        Trigger::Clean => "Couldn't download any of the pending files. Pending items cleared.",
        Trigger::Done => "Couldn't download any files. Merge cancelled.",
    }
}

pub async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user = username(&msg);
    let (cmd, arg) = parse_command(text);
    run_command(&state, ChatId(msg.chat.id.0), user.as_deref(), &cmd, &arg).await;
    Ok(())
}

pub(crate) async fn run_command(
    state: &AppState,
    chat_id: ChatId,
    username: Option<&str>,
    cmd: &str,
    arg: &str,
) {
    let agg = &state.aggregator;

    match cmd {
        "start" | "help" => {
            let mode = agg.mode(chat_id).await;
            let body = if cmd == "start" {
                welcome_text(mode)
            } else {
                HELP_TEXT.to_string()
            };
            send_with_picker(state, chat_id, &body, mode).await;
        }

        "mode" => {
            let Some(raw) = arg.split_whitespace().next() else {
                reply(
                    state,
                    chat_id,
                    "Usage: <code>/mode apex</code> or <code>/mode host</code>",
                )
                .await;
                return;
            };
            match agg.set_mode(chat_id, raw).await {
                Ok(mode) => send_with_picker(state, chat_id, &mode_set_text(mode), mode).await,
                Err(r) => reject(state, chat_id, username, &r).await,
            }
        }

        "settings" => {
            let mode = agg.mode(chat_id).await;
            let body = format!(
                "⚙️ Current mode: <b>{}</b>\nChoose below:",
                mode.as_str().to_uppercase()
            );
            send_with_picker(state, chat_id, &body, mode).await;
        }

        "pending" => {
            let st = agg.status(chat_id).await;
            let mut body = format!(
                "Pending stored items: {} text(s), {} file(s). Send /clean to process or /clear_pending to discard.",
                st.pending_texts, st.pending_files
            );
            if let Some(n) = st.merge_files {
                body.push_str(&format!("\nMerge in progress: {n} file(s). Send /done to finish."));
            }
            reply(state, chat_id, &body).await;
        }

        "clear_pending" => {
            agg.clear_pending(chat_id).await;
            reply(state, chat_id, "Pending stored items cleared.").await;
        }

        "merge" => match agg.start_merge(chat_id).await {
            Ok(()) => reply(state, chat_id, MERGE_STARTED_TEXT).await,
            Err(r) => reject(state, chat_id, username, &r).await,
        },

        "merge_cancel" => match agg.cancel_merge(chat_id).await {
            Ok(n) => {
                debug!(chat_id = chat_id.0, discarded = n, "merge cancelled");
                reply(state, chat_id, "Merge session cancelled.").await;
            }
            Err(r) => reject(state, chat_id, username, &r).await,
        },

        "clean" => process(state, chat_id, username, Trigger::Clean).await,
        "done" => process(state, chat_id, username, Trigger::Done).await,

        _ => {
            reply(state, chat_id, "Unknown command. Send /help for usage.").await;
        }
    }
}

async fn send_with_picker(state: &AppState, chat_id: ChatId, html: &str, mode: Mode) {
    if let Err(e) = state
        .messenger
        .send_html_with_keyboard(chat_id, html, InlineKeyboard::mode_picker(mode))
        .await
    {
        warn!(chat_id = chat_id.0, "reply failed: {e}");
    }
}

/// Run a processing trigger and deliver what it produced.
async fn process(state: &AppState, chat_id: ChatId, username: Option<&str>, trigger: Trigger) {
    let outcome = match state
        .aggregator
        .process(chat_id, trigger, state.fetcher.as_ref())
        .await
    {
        Ok(o) => o,
        Err(r) => {
            reject(state, chat_id, username, &r).await;
            return;
        }
    };

    match outcome {
        Outcome::Delivered { mode, artifacts } => {
            let count = |kind: ArtifactKind| {
                artifacts
                    .iter()
                    .filter(|a| a.kind == kind)
                    .map(|a| a.items)
                    .sum::<usize>()
            };
            state.audit(AuditEvent::processed(
                chat_id,
                username,
                trigger,
                mode,
                count(ArtifactKind::Urls),
                count(ArtifactKind::Cards),
            ));

            for artifact in &artifacts {
                let keyboard =
                    (artifact.kind == ArtifactKind::Urls).then(|| InlineKeyboard::mode_picker(mode));
                if let Err(e) = state
                    .messenger
                    .send_document(chat_id, artifact, keyboard)
                    .await
                {
                    warn!(chat_id = chat_id.0, kind = %artifact.kind, "sending result failed: {e}");
                    reply(
                        state,
                        chat_id,
                        &format!("❌ Failed to send the {} file.", artifact.kind),
                    )
                    .await;
                }
            }
        }
        Outcome::NothingFound { trigger } => {
            let mode = state.aggregator.mode(chat_id).await;
            state.audit(AuditEvent::processed(chat_id, username, trigger, mode, 0, 0));
            reply(state, chat_id, nothing_found_text(trigger)).await;
        }
        Outcome::Unreadable { trigger } => {
            state.audit(AuditEvent::rejected(chat_id, username, "Unreadable"));
            reply(state, chat_id, unreadable_text(trigger)).await;
        }
    }
}
