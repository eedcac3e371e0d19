//! Public-suffix decomposition of hostnames.
//!
//! The canonicalizer only sees the [`SuffixLookup`] trait, so the bundled list
//! can be swapped (or faked in tests) without touching extraction logic.

/// A hostname split around its registrable domain.
///
/// `shop.example.co.uk` → `("shop", "example", "co.uk")`. Any part may be
/// empty: unknown TLDs have no suffix, and a bare suffix has no domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainParts {
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// `domain.suffix`, when both parts are present.
    pub fn registrable(&self) -> Option<String> {
        if self.domain.is_empty() || self.suffix.is_empty() {
            return None;
        }
        Some(format!("{}.{}", self.domain, self.suffix))
    }
}

pub trait SuffixLookup: Send + Sync {
    fn split(&self, host: &str) -> DomainParts;
}

/// [`SuffixLookup`] over the Public Suffix List compiled into the `psl` crate.
///
/// Only ICANN rules count as suffixes. Private rules (`blogspot.com`,
/// `github.io`, ...) are walked back to their ICANN parent, so
/// `me.github.io` reduces to `github.io`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PslLookup;

impl SuffixLookup for PslLookup {
    fn split(&self, host: &str) -> DomainParts {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let Some(suffix_len) = icann_suffix_len(&host) else {
            return DomainParts {
                subdomain: String::new(),
                domain: host,
                suffix: String::new(),
            }
            .with_labels_split();
        };

        let suffix = host[host.len() - suffix_len..].to_string();
        if suffix_len == host.len() {
            return DomainParts {
                suffix,
                ..DomainParts::default()
            };
        }

        // Strip "<suffix>" and the dot before it.
        let rest = &host[..host.len() - suffix_len - 1];
        let (subdomain, domain) = match rest.rsplit_once('.') {
            Some((sub, dom)) => (sub.to_string(), dom.to_string()),
            None => (String::new(), rest.to_string()),
        };

        DomainParts {
            subdomain,
            domain,
            suffix,
        }
    }
}

impl DomainParts {
    // Unknown suffix: the last label acts as the domain, the rest as subdomain.
    fn with_labels_split(self) -> Self {
        match self.domain.rsplit_once('.') {
            Some((sub, dom)) => Self {
                subdomain: sub.to_string(),
                domain: dom.to_string(),
                suffix: self.suffix,
            },
            None => self,
        }
    }
}

/// Byte length of the ICANN public suffix that ends `host`, if the list knows one.
fn icann_suffix_len(host: &str) -> Option<usize> {
    let mut candidate = host;
    loop {
        let suffix = psl::suffix(candidate.as_bytes())?;
        if !suffix.is_known() {
            return None;
        }
        let len = suffix.as_bytes().len();
        match suffix.typ() {
            Some(psl::Type::Private) => {
                // Retry with the private rule minus its leftmost label.
                let rule = &candidate[candidate.len() - len..];
                let (_, parent) = rule.split_once('.')?;
                candidate = parent;
            }
            _ => return Some(len),
        }
    }
}
