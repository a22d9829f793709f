use std::sync::LazyLock;

use regex::Regex;

use super::windows::line_spans;
use crate::record::{Commodity, ContextType};

/// Priority chain, first match wins. Grades come before the bare noun.
static COMMODITY_RULES: LazyLock<Vec<(Commodity, Regex)>> = LazyLock::new(|| {
    [
        (Commodity::BerasMedium, r"(?i)\bberas[^.\n|]{0,30}\bmedium\b"),
        (Commodity::BerasPremium, r"(?i)\bberas[^.\n|]{0,30}\bpremium\b"),
        (
            Commodity::BerasIr64,
            r"(?i)\bberas[^.\n|]{0,40}(?:\bir\.?\s*64\b|\bsetra\s+ramos\b)",
        ),
        (Commodity::Gabah, r"(?i)\b(?:gabah|gkp|gkg)\b"),
        (Commodity::BerasGeneric, r"(?i)\bberas\b"),
    ]
    .into_iter()
    .map(|(commodity, pattern)| (commodity, Regex::new(pattern).unwrap()))
    .collect()
});

static PRODUCER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:gabah|gkp|gkg|penggilingan|petani|produsen|grosir)\b").unwrap()
});

/// A commodity label and where its mention starts in the fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mention {
    pub commodity: Commodity,
    pub start: usize,
}

/// The ordered (label, pattern) table used by [`classify`].
pub fn rules() -> &'static [(Commodity, Regex)] {
    &COMMODITY_RULES
}

pub fn classify(fragment: &str) -> Option<Mention> {
    rules().iter().find_map(|(commodity, re)| {
        re.find(fragment).map(|m| Mention {
            commodity: *commodity,
            start: m.start(),
        })
    })
}

/// The leading mention of every line in the fragment, in text order.
pub fn mentions(fragment: &str) -> Vec<Mention> {
    line_spans(fragment)
        .into_iter()
        .filter_map(|span| {
            classify(&fragment[span.clone()]).map(|m| Mention {
                commodity: m.commodity,
                start: span.start + m.start,
            })
        })
        .collect()
}

pub fn classify_context(fragment: &str) -> ContextType {
    if PRODUCER_RE.is_match(fragment) {
        ContextType::Producer
    } else {
        ContextType::Retail
    }
}
