//! Fact extraction for summary validation.
//!
//! A [`FactSet`] is the set of facts a compressed message must keep: amounts,
//! dates and times, reference identifiers, named entities and explicit action
//! requests. The same extraction runs over the original content and over the
//! candidate summary; retention and traceability are set comparisons between
//! the two.

use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<sym>[$€£¥₹])\s?(?P<n1>\d(?:[\d,]*\d)?(?:\.\d+)?)|\b(?P<pre>USD|EUR|GBP|INR|JPY|CAD|AUD|CHF|NGN|KES|ZAR)\s?(?P<n2>\d(?:[\d,]*\d)?(?:\.\d+)?)|(?P<n3>\d(?:[\d,]*\d)?(?:\.\d+)?)\s?(?P<suf>USD|EUR|GBP|INR|JPY|CAD|AUD|CHF|NGN|KES|ZAR|dollars?|euros?|pounds?|rupees?|naira)\b",
    )
    .expect("AMOUNT_RE regex should compile")
});

const MONTHS: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = [
        r"\b\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}(?::?\d{2})?)?)?".to_string(),
        r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b".to_string(),
        format!(r"\b{MONTHS}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?\b"),
        format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}(?:,?\s+\d{{4}})?\b"),
        r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\s?[ap]m\b)?".to_string(),
        r"\b\d{1,2}\s?[ap]m\b".to_string(),
        r"\b(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|yesterday|today|tomorrow)\b"
            .to_string(),
    ]
    .join("|");
    Regex::new(&format!("(?i){pattern}")).expect("DATE_RE regex should compile")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9](?:[A-Za-z0-9_-]*[A-Za-z0-9])?\b")
        .expect("TOKEN_RE regex should compile")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b[A-Z][A-Za-z'&]*[A-Za-z](?:[ \t]+(?:(?:of|and|&)[ \t]+)?[A-Z][A-Za-z'&]*[A-Za-z])*",
    )
    .expect("ENTITY_RE regex should compile")
});

static ACTION_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(?:talk|speak|chat|connect(?:\s+me)?|transfer(?:\s+me)?)\s+(?:to|with)\s+(?:(?:a|an|the|your|some)\s+)?(?:(?:real|live)\s+)?(?:human|agent|person|representative|manager|supervisor|someone)\b|\b(?:human|live)\s+agent\b",
            "handoff",
        ),
        (r"(?i)\bescalat\w*", "escalate"),
        (r"(?i)\b(?:block|freez)\w*", "block"),
        (r"(?i)\bunblock\w*", "unblock"),
        (r"(?i)\bcancel\w*", "cancel"),
        (r"(?i)\b(?:dispute|chargeback)\w*", "dispute"),
        (r"(?i)\b(?:refund|revers)\w*", "refund"),
        (r"(?i)\bcall\s+me\s+back\b|\bcall\s?back\b", "callback"),
        (r"(?i)\bclose\s+(?:my|the|this)\s+account\b", "close_account"),
        (r"(?i)\breport\w*\s+(?:\w+\s+)?(?:fraud|stolen|lost|unauthori[sz]ed)\b", "report"),
    ]
    .into_iter()
    .map(|(pattern, name)| {
        (
            Regex::new(pattern).expect("action regex should compile"),
            name,
        )
    })
    .collect()
});

/// Capitalized words that do not name a bank, merchant or person.
const NON_ENTITY_WORDS: &[&str] = &[
    "I'm", "I've", "I'd", "I'll", "Hi", "Hello", "Hey", "Dear", "Thanks", "Thank", "Please",
    "Regards", "Sincerely", "Ok", "OK", "Okay", "Yes", "No", "The", "My", "Our", "Your", "We",
    "You", "It", "It's", "This", "That", "And", "But", "So", "Also", "Can", "Could", "Would",
    "Will", "Is", "Are", "Was", "Do", "Did", "Have", "Has", "What", "Why", "When", "Where", "How",
    "If", "Then", "Good", "Morning", "Afternoon", "Evening", "Sir", "Madam", "AI", "Monday",
    "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "January", "February",
    "March", "April", "May", "June", "July", "August", "September", "October", "November",
    "December", "USD", "EUR", "GBP", "INR", "JPY", "CAD", "AUD", "CHF", "NGN", "KES", "ZAR",
];

/// Facts carried by a piece of message content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSet {
    /// Amounts as `CODE value`, e.g. `USD 1200.50`.
    pub amounts: BTreeSet<String>,
    /// Dates and times, lowercased with collapsed whitespace.
    pub dates: BTreeSet<String>,
    /// Transaction and reference identifiers, uppercased.
    pub references: BTreeSet<String>,
    /// Bank, merchant and beneficiary names.
    pub entities: BTreeSet<String>,
    /// Explicit action requests, by kind.
    pub actions: BTreeSet<String>,
}

impl FactSet {
    /// Extracts every fact from `text`.
    #[must_use]
    pub fn extract(text: &str) -> Self {
        let mut facts = Self::default();
        let mut claimed: Vec<Range<usize>> = Vec::new();

        for caps in AMOUNT_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let currency = caps
                .name("sym")
                .or_else(|| caps.name("pre"))
                .or_else(|| caps.name("suf"))
                .map(|m| currency_code(m.as_str()));
            let value = caps
                .name("n1")
                .or_else(|| caps.name("n2"))
                .or_else(|| caps.name("n3"))
                .map(|m| m.as_str().replace(',', ""));
            if let (Some(currency), Some(value)) = (currency, value) {
                facts.amounts.insert(format!("{currency} {value}"));
                claimed.push(whole.range());
            }
        }

        for m in DATE_RE.find_iter(text) {
            facts.dates.insert(collapse_whitespace(m.as_str()).to_lowercase());
            claimed.push(m.range());
        }

        for m in TOKEN_RE.find_iter(text) {
            if overlaps(&claimed, &m.range()) {
                continue;
            }
            if is_reference(m.as_str()) {
                facts.references.insert(m.as_str().to_uppercase());
                claimed.push(m.range());
            }
        }

        for m in ENTITY_RE.find_iter(text) {
            if overlaps(&claimed, &m.range()) {
                continue;
            }
            if let Some(entity) = entity_name(text, m.start(), m.as_str()) {
                facts.entities.insert(entity);
            }
        }

        for (re, name) in ACTION_RES.iter() {
            if re.is_match(text) {
                facts.actions.insert((*name).to_string());
            }
        }

        facts
    }

    /// Returns true if no fact was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
            && self.dates.is_empty()
            && self.references.is_empty()
            && self.entities.is_empty()
            && self.actions.is_empty()
    }

    /// Lists facts of `self` that `summary` does not keep.
    ///
    /// Entities are matched case-insensitively against the summary text, so
    /// a summary may embed a name in a longer phrase.
    #[must_use]
    pub fn missing_from(&self, summary: &FactSet, summary_text: &str) -> Vec<String> {
        let haystack = collapse_whitespace(summary_text).to_lowercase();
        let mut missing = Vec::new();

        missing.extend(labelled("amount", self.amounts.difference(&summary.amounts)));
        missing.extend(labelled("date", self.dates.difference(&summary.dates)));
        missing.extend(labelled("ref", self.references.difference(&summary.references)));
        missing.extend(labelled(
            "entity",
            self.entities
                .iter()
                .filter(|entity| !haystack.contains(&entity.to_lowercase())),
        ));
        missing.extend(labelled("action", self.actions.difference(&summary.actions)));
        missing
    }

    /// Lists amounts, dates and references in `summary` that `self` lacks.
    #[must_use]
    pub fn untraceable(&self, summary: &FactSet) -> Vec<String> {
        let mut extra = Vec::new();
        extra.extend(labelled("amount", summary.amounts.difference(&self.amounts)));
        extra.extend(labelled("date", summary.dates.difference(&self.dates)));
        extra.extend(labelled("ref", summary.references.difference(&self.references)));
        extra
    }
}

fn labelled<'a>(kind: &'a str, facts: impl Iterator<Item = &'a String>) -> impl Iterator<Item = String> {
    facts.map(move |fact| format!("{kind}:{fact}"))
}

fn currency_code(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "$" | "dollar" | "dollars" => "USD".to_string(),
        "€" | "euro" | "euros" => "EUR".to_string(),
        "£" | "pound" | "pounds" => "GBP".to_string(),
        "¥" => "JPY".to_string(),
        "₹" | "rupee" | "rupees" => "INR".to_string(),
        "naira" => "NGN".to_string(),
        _ => raw.to_uppercase(),
    }
}

fn is_reference(token: &str) -> bool {
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    if !has_digit {
        return false;
    }
    let all_digits = token.chars().all(|c| c.is_ascii_digit());
    let has_letter = token.chars().any(|c| c.is_ascii_alphabetic());
    let has_upper = token.chars().any(|c| c.is_ascii_uppercase());
    let len = token.len();

    (all_digits && len >= 8) || (has_upper && len >= 6) || (has_letter && len >= 8)
}

fn entity_name(text: &str, start: usize, run: &str) -> Option<String> {
    let words: Vec<&str> = run.split_whitespace().collect();
    let skip = words
        .iter()
        .take_while(|word| NON_ENTITY_WORDS.contains(*word))
        .count();
    let mut kept = &words[skip..];
    while let Some((last, rest)) = kept.split_last() {
        if !NON_ENTITY_WORDS.contains(last) && !matches!(*last, "of" | "and" | "&") {
            break;
        }
        kept = rest;
    }

    if kept.is_empty() {
        return None;
    }
    if skip == 0 && kept.len() == 1 && sentence_initial(text, start) {
        return None;
    }
    Some(kept.join(" "))
}

fn sentence_initial(text: &str, start: usize) -> bool {
    text[..start]
        .trim_end_matches([' ', '\t'])
        .chars()
        .next_back()
        .is_none_or(|c| matches!(c, '.' | '!' | '?' | ':' | ';' | '\n' | '\r' | '"' | '(' | ','))
}

fn overlaps(claimed: &[Range<usize>], range: &Range<usize>) -> bool {
    claimed
        .iter()
        .any(|c| c.start < range.end && range.start < c.end)
}

/// Byte ranges of amounts and dates in `text`.
///
/// Dates may contain sentence punctuation, as in `Mar. 7, 2024`.
pub(crate) fn punctuated_fact_spans(text: &str) -> Vec<Range<usize>> {
    AMOUNT_RE
        .find_iter(text)
        .chain(DATE_RE.find_iter(text))
        .map(|m| m.range())
        .collect()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
