use std::sync::Arc;

use teloxide::{prelude::*, types::Document};

use scb_core::{
    audit::AuditEvent,
    domain::{ChatId, FileRef},
    session::FileTarget,
};

use crate::router::AppState;

use super::{reject, reply, username};

fn file_ref(doc: &Document) -> FileRef {
    FileRef {
        id: doc.file.id.clone(),
        name: doc
            .file_name
            .clone()
            .unwrap_or_else(|| "file.txt".to_string()),
        size: doc.file.size as u64,
        mime: doc.mime_type.as_ref().map(|m| m.essence_str().to_string()),
    }
}

pub async fn handle_document(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let user = username(&msg);
    save_file(&state, ChatId(msg.chat.id.0), user.as_deref(), file_ref(doc)).await;
    Ok(())
}

pub(crate) async fn save_file(
    state: &AppState,
    chat_id: ChatId,
    username: Option<&str>,
    file: FileRef,
) {
    let name = file.name.clone();
    let size = file.size;
    match state.aggregator.add_file(chat_id, file).await {
        Ok(added) => {
            state.audit(AuditEvent::file_saved(chat_id, username, &name, size));
            let body = match added.target {
                FileTarget::Merge => format!(
                    "✅ File added to merge ({} file(s) collected). Send more <code>.txt</code> files or /done to finish.",
                    added.count
                ),
                FileTarget::Pending => format!(
                    "Saved file to pending ({} file(s)). Send /clean when ready or upload more files.",
                    added.count
                ),
            };
            reply(state, chat_id, &body).await;
        }
        Err(r) => reject(state, chat_id, username, &r).await,
    }
}
