//! Payment-card candidate extraction, Luhn validation and classification.

use std::{collections::HashSet, fmt, sync::OnceLock};

use regex::Regex;

pub const MIN_CARD_DIGITS: usize = 13;
pub const MAX_CARD_DIGITS: usize = 19;

// A digit run with interior spaces/hyphens; length is checked after stripping.
fn candidate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\d[ -]*)+").expect("valid regex"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CardKind {
    Visa,
    AmericanExpress,
    MasterCard,
    Discover,
    Jcb,
    DinersClub,
    MaestroOther,
    Unknown,
}

impl CardKind {
    pub fn label(self) -> &'static str {
        match self {
            CardKind::Visa => "Visa",
            CardKind::AmericanExpress => "American Express",
            CardKind::MasterCard => "MasterCard",
            CardKind::Discover => "Discover",
            CardKind::Jcb => "JCB",
            CardKind::DinersClub => "Diners Club",
            CardKind::MaestroOther => "Maestro/Other",
            CardKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A Luhn-valid card number with its classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub number: String,
    pub kind: CardKind,
}

impl Card {
    /// `Type:digits`, the card artifact line format.
    pub fn to_line(&self) -> String {
        format!("{}:{}", self.kind, self.number)
    }
}

/// Keep ASCII digits only.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Mod-10 check, doubling every second digit from the right.
///
/// Expects ASCII digits; anything else fails the check.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut total = 0u32;
    for (i, ch) in digits.chars().rev().enumerate() {
        let Some(mut d) = ch.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        total += d;
    }
    total % 10 == 0
}

/// Numeric value of the first `n` digits, or 0 when the string is shorter.
fn prefix_value(digits: &str, n: usize) -> u32 {
    digits
        .get(..n)
        .filter(|p| p.len() == n)
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Classify by length and leading digits. First matching rule wins.
///
/// The JCB rule compares the first three digits against 3528..=3589, which
/// no three-digit prefix can satisfy; JCB-range numbers therefore classify
/// as `Unknown`. Kept that way so output stays stable.
pub fn classify(digits: &str) -> CardKind {
    let len = digits.len();
    let starts = |p: &str| digits.starts_with(p);
    let two = prefix_value(digits, 2);
    let three = prefix_value(digits, 3);
    let four = prefix_value(digits, 4);
    let six = prefix_value(digits, 6);

    if matches!(len, 13 | 16 | 19) && starts("4") {
        return CardKind::Visa;
    }
    if len == 15 && (starts("34") || starts("37")) {
        return CardKind::AmericanExpress;
    }
    if len == 16 && ((51..=55).contains(&two) || (2221..=2720).contains(&four)) {
        return CardKind::MasterCard;
    }
    if matches!(len, 16 | 19)
        && (starts("6011")
            || starts("65")
            || (644..=649).contains(&three)
            || (622126..=622925).contains(&six))
    {
        return CardKind::Discover;
    }
    if (16..=19).contains(&len) && (3528..=3589).contains(&three) {
        return CardKind::Jcb;
    }
    if len == 14 && ((300..=305).contains(&three) || starts("36") || starts("38")) {
        return CardKind::DinersClub;
    }
    if (12..=19).contains(&len)
        && (starts("50") || starts("56") || starts("57") || starts("58") || starts("6"))
    {
        return CardKind::MaestroOther;
    }
    CardKind::Unknown
}

/// Luhn-valid, classified card numbers found in `text`, deduplicated, in
/// first-seen order.
pub fn extract_cards(text: &str) -> Vec<Card> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in candidate_re().find_iter(text) {
        let digits = digits_only(m.as_str());
        if !(MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&digits.len()) {
            continue;
        }
        if seen.contains(&digits) || !luhn_valid(&digits) {
            continue;
        }
        seen.insert(digits.clone());
        let kind = classify(&digits);
        out.push(Card {
            number: digits,
            kind,
        });
    }
    out
}
