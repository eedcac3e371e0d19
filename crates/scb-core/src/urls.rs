//! URL candidate extraction and reduction to sites.
//!
//! The candidate grammar is lexical and deliberately permissive: bare domains
//! without a scheme are accepted, TLDs are only required to be two or more
//! letters, and DNS label rules are not enforced.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;
use url::Url;

use crate::{session::Mode, suffix::SuffixLookup};

fn candidate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:(?:https?://)|(?:www\.))?(?:[A-Za-z0-9-]+\.)+[A-Za-z]{2,}(?::\d{2,5})?(?:/\S*)?",
        )
        .expect("valid regex")
    })
}

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+\-.]*://").expect("valid regex"))
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("valid regex"))
}

/// A normalized URL paired with its apex site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UrlPair {
    pub normalized: String,
    pub site: String,
}

impl UrlPair {
    pub fn to_line(&self) -> String {
        format!("{} -> {}", self.normalized, self.site)
    }
}

/// All URL-like substrings of `text`, deduplicated by exact match, in
/// first-seen order.
pub fn extract_candidates(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in candidate_re().find_iter(text) {
        let s = m.as_str().trim();
        if !s.is_empty() && seen.insert(s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Trim and make sure a `scheme://` prefix is present (`https://` by default).
///
/// Any URI scheme counts, not only http(s). Normalizing twice is a no-op.
pub fn normalize_url(raw: &str) -> String {
    let u = raw.trim();
    if u.is_empty() {
        return String::new();
    }
    if scheme_re().is_match(u) {
        return u.to_string();
    }
    format!("https://{u}")
}

/// Lowercased hostname of a URL (normalized first).
///
/// URLs the WHATWG parser rejects (ports above 65535, malformed punycode)
/// still yield the host text between `scheme://` and the port or path.
pub fn hostname(raw: &str) -> Option<String> {
    let normalized = normalize_url(raw);
    if normalized.is_empty() {
        return None;
    }
    let parsed = Url::parse(&normalized).ok();
    let host = match parsed.as_ref().and_then(Url::host_str) {
        Some(h) => h.trim_matches(|c| c == '[' || c == ']'),
        None => lexical_host(&normalized)?,
    };
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

fn lexical_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match authority.strip_prefix('[') {
        Some(v6) => v6.split_once(']')?.0,
        None => authority.split(':').next().unwrap_or_default(),
    };
    Some(host)
}

/// IPv4 dotted quads and `localhost` are never reduced.
pub fn is_unreducible_host(host: &str) -> bool {
    host == "localhost" || ipv4_re().is_match(host)
}

/// Apex form: `https://<registrable domain>`, falling back to the full host
/// when the suffix list cannot split it.
pub fn apex_site(raw: &str, suffixes: &dyn SuffixLookup) -> Option<String> {
    let host = hostname(raw)?;
    if is_unreducible_host(&host) {
        return Some(format!("https://{host}"));
    }
    let site = suffixes.split(&host).registrable().unwrap_or(host);
    Some(format!("https://{site}"))
}

/// Host form: `https://<full hostname>`, subdomains kept.
pub fn host_site(raw: &str) -> Option<String> {
    hostname(raw).map(|host| format!("https://{host}"))
}

pub fn site_for(raw: &str, mode: Mode, suffixes: &dyn SuffixLookup) -> Option<String> {
    match mode {
        Mode::Apex => apex_site(raw, suffixes),
        Mode::Host => host_site(raw),
    }
}

/// Unique sites found in `text`, in order of first production.
pub fn clean_sites(text: &str, mode: Mode, suffixes: &dyn SuffixLookup) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in extract_candidates(text) {
        let Some(site) = site_for(&candidate, mode, suffixes) else {
            continue;
        };
        if seen.insert(site.clone()) {
            out.push(site);
        }
    }
    out
}

/// Unique `(normalized URL, apex site)` pairs found in `text`.
pub fn clean_pairs(text: &str, suffixes: &dyn SuffixLookup) -> Vec<UrlPair> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in extract_candidates(text) {
        let Some(site) = apex_site(&candidate, suffixes) else {
            continue;
        };
        let pair = UrlPair {
            normalized: normalize_url(&candidate),
            site,
        };
        if seen.insert(pair.clone()) {
            out.push(pair);
        }
    }
    out
}
