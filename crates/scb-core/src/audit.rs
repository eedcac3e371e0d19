//! Append-only audit trail of session activity.
//!
//! Only counts, names and sizes are recorded. Message text and card numbers
//! never reach the log.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::ChatId,
    errors::Error,
    session::{Mode, Trigger},
    Result,
};

const AUDIT_MAX_NAME: usize = 200;

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub chat_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, chat_id: ChatId, username: Option<&str>) -> Self {
        Self {
            timestamp: timestamp(),
            event: event.to_string(),
            chat_id: chat_id.0,
            username: username.map(str::to_string),
            bytes: None,
            file_name: None,
            trigger: None,
            mode: None,
            urls: None,
            cards: None,
            reason: None,
        }
    }

    pub fn text_saved(chat_id: ChatId, username: Option<&str>, bytes: u64) -> Self {
        Self {
            bytes: Some(bytes),
            ..Self::base("text_saved", chat_id, username)
        }
    }

    pub fn file_saved(chat_id: ChatId, username: Option<&str>, file_name: &str, bytes: u64) -> Self {
        Self {
            bytes: Some(bytes),
            file_name: Some(file_name.to_string()),
            ..Self::base("file_saved", chat_id, username)
        }
    }

    pub fn processed(
        chat_id: ChatId,
        username: Option<&str>,
        trigger: Trigger,
        mode: Mode,
        urls: usize,
        cards: usize,
    ) -> Self {
        Self {
            trigger: Some(trigger_name(trigger).to_string()),
            mode: Some(mode.to_string()),
            urls: Some(urls),
            cards: Some(cards),
            ..Self::base("processed", chat_id, username)
        }
    }

    pub fn rejected(chat_id: ChatId, username: Option<&str>, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::base("rejected", chat_id, username)
        }
    }
}

fn trigger_name(trigger: Trigger) -> &'static str {
    match trigger {
        Trigger::Clean => "clean",
        Trigger::Done => "done",
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(name) = &event.file_name {
            event.file_name = Some(truncate_text(name, AUDIT_MAX_NAME));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}
