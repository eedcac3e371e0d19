use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use tokio::sync::Mutex;

use crate::domain::{ChatId, FileRef};

/// How URLs are reduced to sites.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Registrable domain only (`shop.example.co.uk` → `example.co.uk`).
    #[default]
    Apex,
    /// Full hostname, subdomains kept.
    Host,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Apex => "apex",
            Mode::Host => "host",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apex" => Ok(Mode::Apex),
            "host" => Ok(Mode::Host),
            other => Err(Rejection::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_file_bytes: u64,
    pub max_merge_bytes: u64,
    pub max_merge_files: usize,
    pub max_pending_bytes: u64,
}

/// Which bucket a processing request drains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// `/clean`: the pending bucket.
    Clean,
    /// `/done`: the merge bucket.
    Done,
}

/// Input-validation and precondition failures. State is never mutated when
/// one of these is returned; the `Display` text is the user-facing reply.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("You're in merge mode. Upload .txt files and use /done to process merged output.")]
    MergeInProgress,

    #[error("Adding this would exceed the pending storage limit. Send /clean or /clear_pending first.")]
    PendingFull,

    #[error("Unsupported file type. Please upload a .txt file.")]
    UnsupportedType,

    #[error("File too large (limit {limit_mib} MB). Skipping this file.")]
    FileTooLarge { limit_mib: u64 },

    #[error("Reached maximum number of merge files ({max}). Send /done to finish or /merge_cancel to cancel.")]
    TooManyMergeFiles { max: usize },

    #[error("Adding this file would exceed the total merge size limit. Send /done or /merge_cancel.")]
    MergeFull,

    #[error("You already have an active merge session. Send more .txt files or /done to finish, /merge_cancel to cancel.")]
    AlreadyMerging,

    #[error("No active merge session. Start one with /merge.")]
    NotMerging,

    #[error("No pending items to clean. Upload text or files first.")]
    NothingPending,

    #[error("No files in this merge yet. Upload .txt files, or /merge_cancel to stop.")]
    EmptyMerge,

    #[error("Total uploaded files exceed the allowed size. Send /merge_cancel and start over.")]
    MergeTooLarge,

    #[error("Unknown mode {0:?}. Usage: /mode apex or /mode host")]
    InvalidMode(String),
}

/// Accumulated inputs awaiting a trigger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bucket {
    pub texts: Vec<String>,
    pub files: Vec<FileRef>,
}

impl Bucket {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.files.is_empty()
    }

    pub fn text_bytes(&self) -> u64 {
        self.texts.iter().map(|t| t.len() as u64).sum()
    }

    /// Declared sizes; the transport reports them before any download.
    pub fn file_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.text_bytes() + self.file_bytes()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileTarget {
    Pending,
    Merge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileAdded {
    pub target: FileTarget,
    /// Files now held by the target bucket.
    pub count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub mode: Mode,
    pub pending_texts: usize,
    pub pending_files: usize,
    /// `Some(files)` while a merge is open.
    pub merge_files: Option<usize>,
}

/// Snapshot of a bucket handed to processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub trigger: Trigger,
    pub mode: Mode,
    pub texts: Vec<String>,
    pub files: Vec<FileRef>,
}

/// Per-chat accumulation state.
///
/// Pending and merge accumulation share one shape; an open merge bucket is
/// the exclusive flag that reroutes documents and blocks text.
#[derive(Clone, Debug, Default)]
pub struct Session {
    mode: Mode,
    pending: Bucket,
    merge: Option<Bucket>,
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, raw: &str) -> Result<Mode, Rejection> {
        let mode = raw.parse::<Mode>()?;
        self.mode = mode;
        Ok(mode)
    }

    pub fn is_merging(&self) -> bool {
        self.merge.is_some()
    }

    pub fn pending(&self) -> &Bucket {
        &self.pending
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            mode: self.mode,
            pending_texts: self.pending.texts.len(),
            pending_files: self.pending.files.len(),
            merge_files: self.merge.as_ref().map(|m| m.files.len()),
        }
    }

    /// Store a text message. Returns the number of pending texts.
    pub fn add_text(&mut self, text: &str, limits: &Limits) -> Result<usize, Rejection> {
        if self.is_merging() {
            return Err(Rejection::MergeInProgress);
        }
        if self.pending.total_bytes() + text.len() as u64 > limits.max_pending_bytes {
            return Err(Rejection::PendingFull);
        }
        self.pending.texts.push(text.to_string());
        Ok(self.pending.texts.len())
    }

    /// Store a file reference in the merge bucket if one is open, else in pending.
    pub fn add_file(&mut self, file: FileRef, limits: &Limits) -> Result<FileAdded, Rejection> {
        if !file.is_plain_text() {
            return Err(Rejection::UnsupportedType);
        }
        if file.size > limits.max_file_bytes {
            return Err(Rejection::FileTooLarge {
                limit_mib: limits.max_file_bytes / (1024 * 1024),
            });
        }

        if let Some(merge) = self.merge.as_mut() {
            if merge.files.len() >= limits.max_merge_files {
                return Err(Rejection::TooManyMergeFiles {
                    max: limits.max_merge_files,
                });
            }
            if merge.file_bytes() + file.size > limits.max_merge_bytes {
                return Err(Rejection::MergeFull);
            }
            merge.files.push(file);
            return Ok(FileAdded {
                target: FileTarget::Merge,
                count: merge.files.len(),
            });
        }

        if self.pending.total_bytes() + file.size > limits.max_pending_bytes {
            return Err(Rejection::PendingFull);
        }
        self.pending.files.push(file);
        Ok(FileAdded {
            target: FileTarget::Pending,
            count: self.pending.files.len(),
        })
    }

    pub fn start_merge(&mut self) -> Result<(), Rejection> {
        if self.is_merging() {
            return Err(Rejection::AlreadyMerging);
        }
        self.merge = Some(Bucket::default());
        Ok(())
    }

    /// Close the merge bucket. Returns the number of discarded files.
    pub fn cancel_merge(&mut self) -> Result<usize, Rejection> {
        match self.merge.take() {
            Some(bucket) => Ok(bucket.files.len()),
            None => Err(Rejection::NotMerging),
        }
    }

    pub fn clear_pending(&mut self) {
        self.pending = Bucket::default();
    }

    /// Check the trigger's preconditions and snapshot its bucket.
    pub fn batch(&self, trigger: Trigger, limits: &Limits) -> Result<Batch, Rejection> {
        let bucket = match trigger {
            Trigger::Clean => &self.pending,
            Trigger::Done => {
                let merge = self.merge.as_ref().ok_or(Rejection::NotMerging)?;
                if !merge.is_empty() && merge.file_bytes() > limits.max_merge_bytes {
                    return Err(Rejection::MergeTooLarge);
                }
                merge
            }
        };
        if bucket.is_empty() {
            return Err(match trigger {
                Trigger::Clean => Rejection::NothingPending,
                Trigger::Done => Rejection::EmptyMerge,
            });
        }

        Ok(Batch {
            trigger,
            mode: self.mode,
            texts: bucket.texts.clone(),
            files: bucket.files.clone(),
        })
    }

    /// Drop the bucket a finished trigger consumed. Mode is kept.
    pub fn complete(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Clean => self.clear_pending(),
            Trigger::Done => self.merge = None,
        }
    }
}

/// Per-chat sessions, created lazily on first use.
///
/// Each chat gets its own lock so a slow batch in one chat never blocks
/// another.
pub struct SessionStore {
    default_mode: Mode,
    inner: Mutex<HashMap<ChatId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(default_mode: Mode) -> Self {
        Self {
            default_mode,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn slot(&self, chat_id: ChatId) -> Arc<Mutex<Session>> {
        let mut map = self.inner.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(self.default_mode))))
            .clone()
    }
}

#[cfg(test)]
impl SessionStore {
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIB: u64 = 1024;

    fn limits() -> Limits {
        Limits {
            max_file_bytes: 10 * KIB,
            max_merge_bytes: 25 * KIB,
            max_merge_files: 3,
            max_pending_bytes: 25 * KIB,
        }
    }

    fn txt(name: &str, size: u64) -> FileRef {
        FileRef {
            id: format!("id-{name}"),
            name: name.to_string(),
            size,
            mime: Some("text/plain".to_string()),
        }
    }

    #[test]
    fn mode_parses_case_insensitively_and_rejects_others() {
        assert_eq!("APEX".parse::<Mode>(), Ok(Mode::Apex));
        assert_eq!(" host ".parse::<Mode>(), Ok(Mode::Host));
        assert!(matches!(
            "subdomain".parse::<Mode>(),
            Err(Rejection::InvalidMode(_))
        ));
        assert_eq!(Mode::default(), Mode::Apex);
        assert_eq!(Mode::Host.to_string(), "host");
    }

    #[test]
    fn set_mode_rejection_keeps_previous_mode() {
        let mut s = Session::new(Mode::Host);
        assert!(s.set_mode("bogus").is_err());
        assert_eq!(s.mode(), Mode::Host);
        assert_eq!(s.set_mode("apex"), Ok(Mode::Apex));
        assert_eq!(s.mode(), Mode::Apex);
    }

    #[test]
    fn texts_accumulate_until_cap() {
        let l = limits();
        let mut s = Session::default();
        assert_eq!(s.add_text("a.com", &l), Ok(1));
        assert_eq!(s.add_text("b.com", &l), Ok(2));

        let big = "x".repeat((25 * KIB) as usize);
        assert_eq!(s.add_text(&big, &l), Err(Rejection::PendingFull));
        assert_eq!(s.status().pending_texts, 2);
    }

    #[test]
    fn text_is_rejected_while_merging() {
        let l = limits();
        let mut s = Session::default();
        s.start_merge().unwrap();
        assert_eq!(s.add_text("a.com", &l), Err(Rejection::MergeInProgress));
        assert!(s.pending().is_empty());
    }

    #[test]
    fn file_validation_happens_before_mutation() {
        let l = limits();
        let mut s = Session::default();

        let mut png = txt("pic.png", 10);
        png.mime = Some("image/png".to_string());
        assert_eq!(s.add_file(png, &l), Err(Rejection::UnsupportedType));

        assert_eq!(
            s.add_file(txt("huge.txt", 11 * KIB), &l),
            Err(Rejection::FileTooLarge { limit_mib: 0 })
        );
        assert!(s.pending().is_empty());
    }

    #[test]
    fn files_go_to_pending_with_cumulative_cap() {
        let l = limits();
        let mut s = Session::default();
        for i in 0..2 {
            let added = s.add_file(txt(&format!("{i}.txt"), 10 * KIB), &l).unwrap();
            assert_eq!(added.target, FileTarget::Pending);
            assert_eq!(added.count, i + 1);
        }
        assert_eq!(
            s.add_file(txt("third.txt", 10 * KIB), &l),
            Err(Rejection::PendingFull)
        );
        assert_eq!(s.status().pending_files, 2);
    }

    #[test]
    fn merge_bucket_enforces_count_and_size() {
        let l = limits();
        let mut s = Session::default();
        s.start_merge().unwrap();
        assert_eq!(s.start_merge(), Err(Rejection::AlreadyMerging));

        let added = s.add_file(txt("a.txt", 10 * KIB), &l).unwrap();
        assert_eq!(added.target, FileTarget::Merge);
        s.add_file(txt("b.txt", 10 * KIB), &l).unwrap();
        assert_eq!(
            s.add_file(txt("c.txt", 6 * KIB), &l),
            Err(Rejection::MergeFull)
        );
        s.add_file(txt("c.txt", 1), &l).unwrap();
        assert_eq!(
            s.add_file(txt("d.txt", 1), &l),
            Err(Rejection::TooManyMergeFiles { max: 3 })
        );
        assert_eq!(s.status().merge_files, Some(3));
        assert!(s.pending().is_empty());
    }

    #[test]
    fn empty_triggers_leave_state_untouched() {
        let l = limits();
        let mut s = Session::new(Mode::Host);
        assert_eq!(s.batch(Trigger::Clean, &l), Err(Rejection::NothingPending));
        assert_eq!(s.batch(Trigger::Done, &l), Err(Rejection::NotMerging));

        s.start_merge().unwrap();
        assert_eq!(s.batch(Trigger::Done, &l), Err(Rejection::EmptyMerge));
        assert!(s.is_merging());
        assert_eq!(s.mode(), Mode::Host);
    }

    #[test]
    fn oversized_merge_batch_is_refused_without_clearing() {
        let mut s = Session::default();
        s.start_merge().unwrap();
        s.add_file(txt("a.txt", 10 * KIB), &limits()).unwrap();

        let tighter = Limits {
            max_merge_bytes: 5 * KIB,
            ..limits()
        };
        assert_eq!(s.batch(Trigger::Done, &tighter), Err(Rejection::MergeTooLarge));
        assert_eq!(s.status().merge_files, Some(1));
    }

    #[test]
    fn batch_snapshots_and_complete_clears_only_that_bucket() {
        let l = limits();
        let mut s = Session::new(Mode::Host);
        s.add_text("a.com", &l).unwrap();
        s.add_file(txt("p.txt", 5), &l).unwrap();
        s.start_merge().unwrap();
        s.add_file(txt("m.txt", 5), &l).unwrap();

        let done = s.batch(Trigger::Done, &l).unwrap();
        assert_eq!(done.files.len(), 1);
        assert_eq!(done.files[0].name, "m.txt");
        assert!(done.texts.is_empty());
        s.complete(Trigger::Done);
        assert!(!s.is_merging());

        let clean = s.batch(Trigger::Clean, &l).unwrap();
        assert_eq!(clean.mode, Mode::Host);
        assert_eq!(clean.texts, vec!["a.com".to_string()]);
        assert_eq!(clean.files[0].name, "p.txt");
        s.complete(Trigger::Clean);
        assert!(s.pending().is_empty());
        assert_eq!(s.mode(), Mode::Host);
    }

    #[test]
    fn cancel_merge_requires_open_merge() {
        let l = limits();
        let mut s = Session::default();
        assert_eq!(s.cancel_merge(), Err(Rejection::NotMerging));
        s.start_merge().unwrap();
        s.add_file(txt("a.txt", 1), &l).unwrap();
        assert_eq!(s.cancel_merge(), Ok(1));
        assert!(!s.is_merging());
    }

    #[test]
    fn rejection_messages_are_user_facing() {
        assert_eq!(
            Rejection::NothingPending.to_string(),
            "No pending items to clean. Upload text or files first."
        );
        assert_eq!(
            Rejection::FileTooLarge { limit_mib: 10 }.to_string(),
            "File too large (limit 10 MB). Skipping this file."
        );
    }

    #[tokio::test]
    async fn store_isolates_chats_and_reuses_slots() {
        let store = SessionStore::new(Mode::Host);
        assert!(store.is_empty().await);

        let a = store.slot(ChatId(1)).await;
        a.lock().await.add_text("a.com", &limits()).unwrap();

        let b = store.slot(ChatId(2)).await;
        assert_eq!(b.lock().await.status().pending_texts, 0);
        assert_eq!(b.lock().await.mode(), Mode::Host);

        let a_again = store.slot(ChatId(1)).await;
        assert!(Arc::ptr_eq(&a, &a_again));
        assert_eq!(a_again.lock().await.status().pending_texts, 1);
        assert_eq!(store.len().await, 2);
    }
}
