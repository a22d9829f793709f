use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Western Indonesia Time; naive timestamps from the sources are local to it.
pub static WIB: LazyLock<FixedOffset> = LazyLock::new(|| FixedOffset::east_opt(7 * 3600).unwrap());

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Detik,
    Arimbi,
    Sibapokting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Commodity {
    BerasMedium,
    BerasPremium,
    #[serde(rename = "BerasIR64")]
    BerasIr64,
    Gabah,
    BerasGeneric,
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Commodity::BerasMedium => "Beras Medium",
            Commodity::BerasPremium => "Beras Premium",
            Commodity::BerasIr64 => "Beras IR64",
            Commodity::Gabah => "Gabah",
            Commodity::BerasGeneric => "Beras",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceUnit {
    PerKilogram,
    PerLiter,
}

impl PriceUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            PriceUnit::PerKilogram => "Rp/kg",
            PriceUnit::PerLiter => "Rp/ltr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    Retail,
    Producer,
}

/// One already-fetched page, as handed to the extraction engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub document_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub source: Source,
    pub document_url: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub region: String,
    pub commodity: Commodity,
    pub price_value: u64,
    pub price_unit: PriceUnit,
    pub context_type: ContextType,
    pub raw_text: String,
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling_price: Option<u64>,
}

impl PriceRecord {
    /// Identity used for per-document deduplication. `raw_text` is not part of it.
    pub fn dedup_key(&self) -> (&str, Commodity, u64) {
        (&self.document_url, self.commodity, self.price_value)
    }
}

/// Lenient timestamp parsing for page metadata. Naive values are taken as WIB.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return naive.and_local_timezone(*WIB).single();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(start_of_day)
}

/// Strict variant for user-supplied `--since` values.
pub fn parse_since(raw: &str) -> Result<DateTime<FixedOffset>> {
    parse_timestamp(raw).ok_or_else(|| ScrapeError::InvalidDate(raw.to_string()))
}

pub fn start_of_day(date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(0, 0, 0)?.and_local_timezone(*WIB).single()
}
