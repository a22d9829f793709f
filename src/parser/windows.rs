use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::price::CURRENCY_RE;

/// Joins the lines of one window. Treated as a line break by the price pairing.
pub const WINDOW_SEPARATOR: &str = " | ";

static COMMODITY_HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)beras|gabah|\bgk[pg]\b").unwrap());

/// Trimmed, non-empty lines of a body text.
pub fn body_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Overlapping candidate blocks for one body text.
///
/// For each line index one window per size is emitted (clamped at the end of
/// the text), followed by the whole text. A commodity name and a price up to
/// `max(sizes) - 1` lines apart therefore share at least one block. The
/// overlap is resolved by dedup downstream.
pub fn generate(text: &str, sizes: &[usize]) -> Vec<String> {
    let lines = body_lines(text);
    if lines.is_empty() {
        return Vec::new();
    }

    let mut blocks = Vec::with_capacity(lines.len() * sizes.len() + 1);
    for i in 0..lines.len() {
        let mut last_end = None;
        for &size in sizes {
            let end = (i + size.max(1)).min(lines.len());
            if last_end == Some(end) {
                continue;
            }
            last_end = Some(end);
            blocks.push(lines[i..end].join(WINDOW_SEPARATOR));
        }
    }
    blocks.push(lines.join("\n"));

    blocks.retain(|b| is_candidate(b));
    blocks
}

/// Cheap pre-filter: a block needs a commodity hint or a currency figure.
pub fn is_candidate(block: &str) -> bool {
    COMMODITY_HINT_RE.is_match(block) || CURRENCY_RE.is_match(block)
}

/// Byte offset where the line containing `pos` starts.
pub fn line_start(text: &str, pos: usize) -> usize {
    let head = &text[..pos];
    let nl = head.rfind('\n').map(|i| i + 1);
    let sep = head.rfind(WINDOW_SEPARATOR).map(|i| i + WINDOW_SEPARATOR.len());
    nl.max(sep).unwrap_or(0)
}

/// Byte offset where the line containing `pos` ends (exclusive).
pub fn line_end(text: &str, pos: usize) -> usize {
    next_break(&text[pos..]).map_or(text.len(), |(i, _)| pos + i)
}

/// Byte offset just past the `n`th line break after `pos`, or the end of the text.
pub fn nth_break_after(text: &str, pos: usize, n: usize) -> usize {
    let mut cursor = pos;
    for _ in 0..n {
        match next_break(&text[cursor..]) {
            Some((i, len)) => cursor += i + len,
            None => return text.len(),
        }
    }
    cursor
}

/// Byte spans of every line of a block, window separators included as breaks.
pub fn line_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    loop {
        let end = line_end(text, pos);
        spans.push(pos..end);
        if end >= text.len() {
            return spans;
        }
        pos = nth_break_after(text, pos, 1);
    }
}

/// Offset and length of the first `\n` or window separator.
fn next_break(text: &str) -> Option<(usize, usize)> {
    let nl = text.find('\n').map(|i| (i, 1));
    let sep = text.find(WINDOW_SEPARATOR).map(|i| (i, WINDOW_SEPARATOR.len()));
    match (nl, sep) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
