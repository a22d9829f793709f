use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::commodity::classify;
use super::windows::{line_start, nth_break_after};
use crate::record::PriceUnit;

/// `Rp13.500`, `Rp. 1,250,000`, `IDR 6.200`. Requires thousands grouping so
/// dates, phone numbers and percentages never match.
pub static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bRp\.?|\bIDR)\s*([0-9]{1,3}(?:[.,][0-9]{3})+)(?:[^0-9]|$)").unwrap()
});
static UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(kilogram|kilo|kg|liter|litre|ltr)\b").unwrap());

/// Characters inspected on each side of a figure when looking for its unit.
const UNIT_RADIUS: usize = 30;
/// Line breaks a price may trail its commodity mention by.
const MAX_TRAILING_BREAKS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub value: u64,
    pub unit: PriceUnit,
    /// Byte span of the digits inside the parsed fragment.
    pub span: Range<usize>,
}

/// First well-formed currency figure in the fragment.
pub fn parse(fragment: &str) -> Option<Price> {
    CURRENCY_RE
        .captures_iter(fragment)
        .find_map(|caps| price_from(fragment, &caps))
}

/// Price belonging to a commodity mention starting at byte `anchor`.
///
/// Looks forward from the mention through the end of the second following
/// line, stopping at a later line that names its own commodity before the
/// figure. Falls back to the closest figure before the mention on the same
/// line. Figures on earlier lines are never paired.
pub fn parse_near(fragment: &str, anchor: usize) -> Option<Price> {
    let anchor = anchor.min(fragment.len());
    let same_line = line_start(fragment, anchor);
    let forward_end = nth_break_after(fragment, anchor, MAX_TRAILING_BREAKS + 1);

    let mut before = None;
    for caps in CURRENCY_RE.captures_iter(fragment) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        if whole.start >= forward_end {
            break;
        }
        let figure_line = line_start(fragment, whole.start);
        if figure_line > anchor && classify(&fragment[figure_line..whole.start]).is_some() {
            break;
        }
        if whole.start >= anchor {
            if let Some(price) = price_from(fragment, &caps) {
                return Some(price);
            }
        } else if whole.start >= same_line {
            if let Some(price) = price_from(fragment, &caps) {
                before = Some(price);
            }
        }
    }
    before
}

fn price_from(fragment: &str, caps: &Captures) -> Option<Price> {
    let digits = caps.get(1)?;
    let value = parse_grouped(digits.as_str())?;
    let unit = unit_near(fragment, digits.range());
    Some(Price {
        value,
        unit,
        span: digits.range(),
    })
}

/// `13.500` -> 13500. Zero and overflow are malformed.
pub(crate) fn parse_grouped(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u64>().ok().filter(|&v| v > 0)
}

/// Unit keyword closest to the figure; kilogram when none is nearby.
fn unit_near(fragment: &str, figure: Range<usize>) -> PriceUnit {
    let (lo, hi) = char_window(fragment, figure.clone(), UNIT_RADIUS);
    let window = &fragment[lo..hi];

    let nearest = UNIT_RE
        .find_iter(window)
        .map(|m| {
            let (start, end) = (lo + m.start(), lo + m.end());
            let distance = if end <= figure.start {
                // prefer a trailing unit on ties
                (figure.start - end) * 2 + 1
            } else {
                start.saturating_sub(figure.end) * 2
            };
            (distance, m.as_str())
        })
        .min_by_key(|(distance, _)| *distance);

    match nearest {
        Some((_, kw)) if kw.to_ascii_lowercase().starts_with('l') => PriceUnit::PerLiter,
        _ => PriceUnit::PerKilogram,
    }
}

/// Byte bounds of `radius` characters on each side of `span`.
fn char_window(text: &str, span: Range<usize>, radius: usize) -> (usize, usize) {
    let lo = text[..span.start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(span.start, |(i, _)| i);
    let hi = text[span.end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| span.end + i);
    (lo, hi)
}
