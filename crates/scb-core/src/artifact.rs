//! Output files produced by a processing run.

use std::{fmt, str::FromStr};

use crate::{
    domain::FileRef,
    errors::Error,
    session::{Batch, Mode, Trigger},
};

/// Shape of the URL artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UrlOutput {
    /// One site per line.
    #[default]
    Sites,
    /// One `normalized -> apex site` pair per line.
    Pairs,
}

impl FromStr for UrlOutput {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sites" => Ok(UrlOutput::Sites),
            "pairs" => Ok(UrlOutput::Pairs),
            other => Err(Error::Config(format!("unknown url output {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Urls,
    Cards,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Urls => f.write_str("urls"),
            ArtifactKind::Cards => f.write_str("cards"),
        }
    }
}

/// A line-oriented text file to send back to the chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub filename: String,
    pub content: Vec<u8>,
    /// Telegram HTML.
    pub caption: String,
    /// Number of lines in `content`.
    pub items: usize,
}

impl Artifact {
    pub fn urls(names: &ArtifactNames, lines: &[String], mode: Mode, output: UrlOutput) -> Self {
        let verb = match names.trigger {
            Trigger::Clean => "Extracted",
            Trigger::Done => "Merged and extracted",
        };
        let caption = match output {
            UrlOutput::Sites => format!(
                "✅ {verb} {} site(s) in <b>{}</b> mode.",
                lines.len(),
                mode.as_str().to_uppercase()
            ),
            UrlOutput::Pairs => format!("✅ {verb} {} URL(s) with their apex sites.", lines.len()),
        };
        Self {
            kind: ArtifactKind::Urls,
            filename: names.urls.clone(),
            content: render_lines(lines),
            caption,
            items: lines.len(),
        }
    }

    pub fn cards(names: &ArtifactNames, lines: &[String]) -> Self {
        Self {
            kind: ArtifactKind::Cards,
            filename: names.cards.clone(),
            content: render_lines(lines),
            caption: format!(
                "🔒 Extracted {} validated credit card(s). Keep them secure.",
                lines.len()
            ),
            items: lines.len(),
        }
    }
}

/// One item per line, newline-terminated.
pub fn render_lines(lines: &[String]) -> Vec<u8> {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.into_bytes()
}

/// Output file names for one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactNames {
    pub trigger: Trigger,
    pub urls: String,
    pub cards: String,
}

impl ArtifactNames {
    pub fn for_batch(batch: &Batch) -> Self {
        let first = first_name(&batch.files);
        let (urls, cards) = match batch.trigger {
            Trigger::Done => (merged_filename(first), merged_cards_filename(first)),
            Trigger::Clean => match batch.files.as_slice() {
                [only] if batch.texts.is_empty() => (
                    cleaned_filename(&only.name, "cleaned_"),
                    format!("cards_{}", only.name),
                ),
                _ => match first {
                    Some(_) => (merged_filename(first), merged_cards_filename(first)),
                    None => ("urls.txt".to_string(), "cards.txt".to_string()),
                },
            },
        };
        Self {
            trigger: batch.trigger,
            urls,
            cards,
        }
    }
}

fn first_name(files: &[FileRef]) -> Option<&str> {
    files
        .iter()
        .map(|f| f.name.as_str())
        .find(|n| !n.is_empty())
}

/// `(stem, ext)` where `ext` keeps its dot. Leading dots do not start an
/// extension, so `.env` has none.
pub fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// `<prefix><stem><ext>`, or `<prefix>urls.txt` for names without a dot.
pub fn cleaned_filename(original: &str, prefix: &str) -> String {
    if original.is_empty() || !original.contains('.') {
        return format!("{prefix}urls.txt");
    }
    let (stem, ext) = split_ext(original);
    let ext = if ext.is_empty() { ".txt" } else { ext };
    let stem = match stem.trim() {
        "" => "file",
        s => s,
    };
    format!("{prefix}{stem}{ext}")
}

pub fn merged_filename(first: Option<&str>) -> String {
    merged_name("merged_", first)
}

pub fn merged_cards_filename(first: Option<&str>) -> String {
    merged_name("merged_cards_", first)
}

fn merged_name(prefix: &str, first: Option<&str>) -> String {
    let stem = first
        .filter(|n| !n.is_empty())
        .map(|n| split_ext(n).0.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("files");
    format!("{prefix}{stem}_cleaned.txt")
}
