//! Session-level operations: accumulate inputs per chat, then run both
//! extraction pipelines over the concatenated batch.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    artifact::{Artifact, ArtifactNames, UrlOutput},
    cards::{extract_cards, Card},
    config::Config,
    domain::{ChatId, FileRef},
    ports::FileFetcher,
    session::{
        Batch, FileAdded, Limits, Mode, Rejection, SessionStatus, SessionStore, Trigger,
    },
    suffix::SuffixLookup,
    urls::{clean_pairs, clean_sites, UrlPair},
};

/// Result of a processing trigger that passed its preconditions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// URL artifact first, card artifact second; at least one is present.
    Delivered {
        mode: Mode,
        artifacts: Vec<Artifact>,
    },
    /// The batch was read but neither pipeline found anything.
    NothingFound { trigger: Trigger },
    /// Every file failed to download and there was no text to fall back on.
    Unreadable { trigger: Trigger },
}

/// Pipeline output for one blob of text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Sites or `normalized -> site` lines, depending on [`UrlOutput`].
    pub url_lines: Vec<String>,
    pub cards: Vec<Card>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.url_lines.is_empty() && self.cards.is_empty()
    }
}

/// Run both pipelines over `text`.
pub fn extract(
    text: &str,
    mode: Mode,
    output: UrlOutput,
    suffixes: &dyn SuffixLookup,
) -> Extraction {
    let url_lines = match output {
        UrlOutput::Sites => clean_sites(text, mode, suffixes),
        UrlOutput::Pairs => clean_pairs(text, suffixes)
            .iter()
            .map(UrlPair::to_line)
            .collect(),
    };
    Extraction {
        url_lines,
        cards: extract_cards(text),
    }
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
pub fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

pub struct Aggregator {
    limits: Limits,
    url_output: UrlOutput,
    store: SessionStore,
    suffixes: Arc<dyn SuffixLookup>,
}

impl Aggregator {
    pub fn new(cfg: &Config, suffixes: Arc<dyn SuffixLookup>) -> Self {
        Self::with_parts(cfg.limits, cfg.url_output, cfg.default_mode, suffixes)
    }

    pub fn with_parts(
        limits: Limits,
        url_output: UrlOutput,
        default_mode: Mode,
        suffixes: Arc<dyn SuffixLookup>,
    ) -> Self {
        Self {
            limits,
            url_output,
            store: SessionStore::new(default_mode),
            suffixes,
        }
    }

    pub async fn mode(&self, chat_id: ChatId) -> Mode {
        self.store.slot(chat_id).await.lock().await.mode()
    }

    pub async fn set_mode(&self, chat_id: ChatId, raw: &str) -> Result<Mode, Rejection> {
        let slot = self.store.slot(chat_id).await;
        let mode = slot.lock().await.set_mode(raw)?;
        info!(chat_id = chat_id.0, mode = %mode, "mode changed");
        Ok(mode)
    }

    pub async fn status(&self, chat_id: ChatId) -> SessionStatus {
        self.store.slot(chat_id).await.lock().await.status()
    }

    pub async fn add_text(&self, chat_id: ChatId, text: &str) -> Result<usize, Rejection> {
        let slot = self.store.slot(chat_id).await;
        let count = slot.lock().await.add_text(text, &self.limits)?;
        debug!(chat_id = chat_id.0, bytes = text.len(), count, "text stored");
        Ok(count)
    }

    pub async fn add_file(&self, chat_id: ChatId, file: FileRef) -> Result<FileAdded, Rejection> {
        let slot = self.store.slot(chat_id).await;
        let size = file.size;
        let added = slot.lock().await.add_file(file, &self.limits)?;
        debug!(chat_id = chat_id.0, size, count = added.count, target = ?added.target, "file stored");
        Ok(added)
    }

    pub async fn start_merge(&self, chat_id: ChatId) -> Result<(), Rejection> {
        self.store.slot(chat_id).await.lock().await.start_merge()
    }

    pub async fn cancel_merge(&self, chat_id: ChatId) -> Result<usize, Rejection> {
        self.store.slot(chat_id).await.lock().await.cancel_merge()
    }

    pub async fn clear_pending(&self, chat_id: ChatId) {
        self.store.slot(chat_id).await.lock().await.clear_pending();
    }

    /// Process the bucket selected by `trigger`.
    ///
    /// Precondition failures return a [`Rejection`] and leave the session as
    /// it was. Once past them, the bucket is cleared whatever the outcome.
    /// The chat's session stays locked for the whole run.
    pub async fn process(
        &self,
        chat_id: ChatId,
        trigger: Trigger,
        fetcher: &dyn FileFetcher,
    ) -> Result<Outcome, Rejection> {
        let slot = self.store.slot(chat_id).await;
        let mut session = slot.lock().await;
        let batch = session.batch(trigger, &self.limits)?;

        let outcome = self.run_batch(chat_id, &batch, fetcher).await;
        session.complete(trigger);
        Ok(outcome)
    }

    async fn run_batch(&self, chat_id: ChatId, batch: &Batch, fetcher: &dyn FileFetcher) -> Outcome {
        let mut parts: Vec<String> = Vec::with_capacity(batch.files.len() + batch.texts.len());
        let mut failed = 0usize;

        // Accumulation order, one file at a time.
        for file in &batch.files {
            match fetcher.fetch(file).await {
                Ok(bytes) => parts.push(decode_dropping_invalid(&bytes)),
                Err(e) => {
                    failed += 1;
                    warn!(chat_id = chat_id.0, file_id = %file.id, "skipping file: {e}");
                }
            }
        }

        if !batch.files.is_empty() && failed == batch.files.len() && batch.texts.is_empty() {
            warn!(chat_id = chat_id.0, files = failed, "no file in the batch could be read");
            return Outcome::Unreadable {
                trigger: batch.trigger,
            };
        }

        parts.extend(batch.texts.iter().cloned());
        let combined = parts.join("\n");

        let found = extract(&combined, batch.mode, self.url_output, self.suffixes.as_ref());
        info!(
            chat_id = chat_id.0,
            trigger = ?batch.trigger,
            mode = %batch.mode,
            files = batch.files.len(),
            failed,
            texts = batch.texts.len(),
            urls = found.url_lines.len(),
            cards = found.cards.len(),
            "batch processed"
        );

        if found.is_empty() {
            return Outcome::NothingFound {
                trigger: batch.trigger,
            };
        }

        let names = ArtifactNames::for_batch(batch);
        let mut artifacts = Vec::with_capacity(2);
        if !found.url_lines.is_empty() {
            artifacts.push(Artifact::urls(
                &names,
                &found.url_lines,
                batch.mode,
                self.url_output,
            ));
        }
        if !found.cards.is_empty() {
            let lines: Vec<String> = found.cards.iter().map(Card::to_line).collect();
            artifacts.push(Artifact::cards(&names, &lines));
        }

        Outcome::Delivered {
            mode: batch.mode,
            artifacts,
        }
    }
}
