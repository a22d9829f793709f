use std::sync::LazyLock;

use chrono::NaiveDate;
use clap::ValueEnum;
use regex::Regex;
use tracing::debug;

use super::extract::dedup;
use super::price::{self, parse_grouped};
use crate::record::{start_of_day, Commodity, ContextType, PriceRecord, PriceUnit, Source};

/// How far past its heading a commodity block on the main board may run.
const MAX_BLOCK_CHARS: usize = 400;

/// Headings used by the regency board, in the order they are looked up.
static BOARD_ALIASES: LazyLock<Vec<(Commodity, Regex)>> = LazyLock::new(|| {
    [
        (Commodity::BerasPremium, r"(?i)\bBERAS\s+PREMIUM\b"),
        (Commodity::BerasMedium, r"(?i)\bBERAS\s+MEDIUM\b"),
        (Commodity::BerasIr64, r"(?i)\bBERAS\s+IR\.?\s*\.?\s*64\b"),
    ]
    .into_iter()
    .map(|(commodity, pattern)| (commodity, Regex::new(pattern).unwrap()))
    .collect()
});

/// Comparison table: the first grouped figure after the alias is today's price.
static VARIANS_ROWS: LazyLock<Vec<(Commodity, Regex)>> = LazyLock::new(|| {
    BOARD_ALIASES
        .iter()
        .map(|(commodity, alias)| {
            let pattern = format!(r"{}[\s\S]*?(\d{{1,3}}(?:\.\d{{3}})+)", alias.as_str());
            (*commodity, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static ARIMBI_ROWS: LazyLock<Vec<(Commodity, Regex)>> = LazyLock::new(|| {
    [
        (Commodity::BerasPremium, r"(?i)Beras\s*Premium.*?Rp\.?\s*(\d{1,3}(?:[.,]\d{3})+)"),
        (Commodity::BerasMedium, r"(?i)Beras\s*Medium.*?Rp\.?\s*(\d{1,3}(?:[.,]\d{3})+)"),
    ]
    .into_iter()
    .map(|(commodity, pattern)| (commodity, Regex::new(pattern).unwrap()))
    .collect()
});

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][A-Z .]{3,}$").unwrap());
/// Dotted thousands only; a `,00` cents suffix is not part of the figure.
/// A bare `0` still matches so an empty reading can be recognised.
static CURRENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Saat\s+ini\s*:?\s*Rp\.?\s*(\d{1,3}(?:\.\d{3})+|\d+)").unwrap()
});
static CEILING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)HET\s*:?\s*Rp\.?\s*(\d{1,3}(?:\.\d{3})+|\d+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BoardKind {
    /// Regency board, one block per commodity with current price and HET.
    Sibapokting,
    /// Regency comparison table (`/varians`).
    SibapoktingVarians,
    /// Municipal market page.
    Arimbi,
}

impl BoardKind {
    pub fn source(self) -> Source {
        match self {
            BoardKind::Sibapokting | BoardKind::SibapoktingVarians => Source::Sibapokting,
            BoardKind::Arimbi => Source::Arimbi,
        }
    }

    pub fn region(self) -> &'static str {
        match self {
            BoardKind::Sibapokting | BoardKind::SibapoktingVarians => "Kabupaten Bandung",
            BoardKind::Arimbi => "Kota Bandung",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            BoardKind::Sibapokting => "https://sibapokting.bandungkab.go.id/",
            BoardKind::SibapoktingVarians => "https://sibapokting.bandungkab.go.id/varians",
            BoardKind::Arimbi => "https://arimbi.bandung.go.id/market",
        }
    }
}

/// One board row before it is stamped with page-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    commodity: Commodity,
    value: u64,
    ceiling: Option<u64>,
    raw: String,
}

/// Price records for one board page observed on `observed`.
pub fn parse_board(kind: BoardKind, text: &str, url: &str, observed: NaiveDate) -> Vec<PriceRecord> {
    let rows = match kind {
        BoardKind::Sibapokting => main_rows(text),
        BoardKind::SibapoktingVarians => table_rows(text, &VARIANS_ROWS),
        BoardKind::Arimbi => table_rows(text, &ARIMBI_ROWS),
    };
    debug!(?kind, url, rows = rows.len(), "board parsed");

    let published_at = start_of_day(observed);
    let records = rows
        .into_iter()
        .map(|row| PriceRecord {
            source: kind.source(),
            document_url: url.to_string(),
            published_at,
            region: kind.region().to_string(),
            commodity: row.commodity,
            price_value: row.value,
            price_unit: PriceUnit::PerKilogram,
            context_type: ContextType::Retail,
            raw_text: row.raw,
            headline: None,
            ceiling_price: row.ceiling,
        })
        .collect();
    dedup(records)
}

fn main_rows(text: &str) -> Vec<Row> {
    let starts: Vec<(Commodity, usize, usize)> = BOARD_ALIASES
        .iter()
        .filter_map(|(commodity, re)| re.find(text).map(|m| (*commodity, m.start(), m.end())))
        .collect();

    starts
        .iter()
        .filter_map(|&(commodity, start, heading_end)| {
            let end = block_end(text, start, heading_end, &starts);
            let block = &text[start..end];
            let value = current_price(block)?;
            let ceiling = CEILING_RE
                .captures(block)
                .and_then(|c| parse_grouped(c.get(1)?.as_str()));
            Some(Row {
                commodity,
                value,
                ceiling,
                raw: block.trim().to_string(),
            })
        })
        .collect()
}

/// Earliest of: the next commodity heading, the next all-caps heading line,
/// or `MAX_BLOCK_CHARS` characters.
fn block_end(text: &str, start: usize, heading_end: usize, starts: &[(Commodity, usize, usize)]) -> usize {
    let by_length = text[start..]
        .char_indices()
        .nth(MAX_BLOCK_CHARS)
        .map_or(text.len(), |(i, _)| start + i);

    let by_alias = starts
        .iter()
        .map(|&(_, s, _)| s)
        .filter(|&s| s > start)
        .min()
        .unwrap_or(text.len());

    let body_from = text[heading_end..]
        .find('\n')
        .map_or(text.len(), |i| heading_end + i + 1);
    let mut offset = body_from;
    let mut by_heading = text.len();
    for line in text[body_from..].split_inclusive('\n') {
        if HEADING_RE.is_match(line.trim()) {
            by_heading = offset;
            break;
        }
        offset += line.len();
    }

    by_length.min(by_alias).min(by_heading)
}

/// "Saat ini" when present, even if it is zero. Otherwise the first figure
/// on a line that is not the ceiling.
fn current_price(block: &str) -> Option<u64> {
    if let Some(caps) = CURRENT_RE.captures(block) {
        return parse_grouped(caps.get(1)?.as_str());
    }
    block
        .lines()
        .filter(|line| !CEILING_RE.is_match(line))
        .find_map(|line| price::parse(line).map(|p| p.value))
}

fn table_rows(text: &str, patterns: &[(Commodity, Regex)]) -> Vec<Row> {
    patterns
        .iter()
        .filter_map(|(commodity, re)| {
            let caps = re.captures(text)?;
            Some(Row {
                commodity: *commodity,
                value: parse_grouped(caps.get(1)?.as_str())?,
                ceiling: None,
                raw: caps.get(0)?.as_str().trim().to_string(),
            })
        })
        .collect()
}
