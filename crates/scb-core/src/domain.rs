/// Telegram chat id (numeric). Sessions are keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// An uploaded document as announced by the transport.
///
/// Only metadata is kept at upload time; bytes are fetched lazily when a
/// batch is processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime: Option<String>,
}

impl FileRef {
    /// `text/plain` MIME (any case) or a `.txt` name.
    pub fn is_plain_text(&self) -> bool {
        let mime_ok = self
            .mime
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("text/plain"));
        mime_ok || self.name.to_lowercase().ends_with(".txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: Option<&str>) -> FileRef {
        FileRef {
            id: "f".to_string(),
            name: name.to_string(),
            size: 1,
            mime: mime.map(|s| s.to_string()),
        }
    }

    #[test]
    fn plain_text_by_mime_or_extension() {
        assert!(file("notes.TXT", None).is_plain_text());
        assert!(file("notes", Some("Text/Plain")).is_plain_text());
        assert!(file("dump.log", Some("text/plain")).is_plain_text());
        assert!(!file("dump.csv", Some("text/csv")).is_plain_text());
        assert!(!file("photo.png", Some("image/png")).is_plain_text());
    }
}
