use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use super::commodity::{self, Mention};
use super::price::{self, Price};
use super::region::{Region, RegionInferrer};
use super::windows::{self, line_end, line_start};
use crate::config::Settings;
use crate::error::Result;
use crate::record::{parse_since, parse_timestamp, Document, PriceRecord, Source};

/// Everything needed to turn one document into price records. Built once,
/// shared read-only across worker threads.
pub struct Extractor {
    regions: RegionInferrer,
    scope_keywords: Vec<String>,
    since: Option<DateTime<FixedOffset>>,
    window_sizes: Vec<usize>,
}

/// A block that survived classification and price parsing.
struct Candidate<'a> {
    mention: Mention,
    price: Price,
    fragment: &'a str,
}

impl Extractor {
    pub fn new(settings: &Settings) -> Result<Self> {
        let since = settings.since.as_deref().map(parse_since).transpose()?;
        Ok(Extractor {
            regions: RegionInferrer::new(&settings.regions, &settings.default_region)?,
            scope_keywords: settings
                .scope_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            since,
            window_sizes: settings.window_sizes.clone(),
        })
    }

    /// Final, filtered and deduplicated records for one document. Never fails;
    /// a document with nothing usable yields an empty list.
    pub fn extract(&self, source: Source, doc: &Document) -> Vec<PriceRecord> {
        if doc.document_url.trim().is_empty() {
            debug!(headline = %doc.headline, "document without URL, dropped");
            return Vec::new();
        }
        let region = self.regions.infer(&doc.headline, &doc.body_text);
        if !self.in_scope(&region, doc) {
            debug!(url = %doc.document_url, region = %region.label, "out of scope, dropped");
            return Vec::new();
        }

        let published_at = doc.published_at.as_deref().and_then(parse_timestamp);
        if let Some(since) = self.since {
            if published_at.map_or(true, |ts| ts <= since) {
                debug!(url = %doc.document_url, published = ?published_at, "not after --since, dropped");
                return Vec::new();
            }
        }

        let headline = Some(doc.headline.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        let blocks = windows::generate(&doc.body_text, &self.window_sizes);
        let records: Vec<PriceRecord> = blocks
            .iter()
            .flat_map(|block| candidates(block))
            .map(|c| PriceRecord {
                source,
                document_url: doc.document_url.clone(),
                published_at,
                region: region.label.clone(),
                commodity: c.mention.commodity,
                price_value: c.price.value,
                price_unit: c.price.unit,
                context_type: commodity::classify_context(c.fragment),
                raw_text: c.fragment.to_string(),
                headline: headline.clone(),
                ceiling_price: None,
            })
            .collect();

        let paired = records.len();
        let records = dedup(records);
        debug!(
            url = %doc.document_url,
            region = %region.label,
            origin = ?region.origin,
            tier = ?region.tier,
            blocks = blocks.len(),
            paired,
            kept = records.len(),
            "document extracted"
        );
        records
    }

    /// The region label, headline or body must mention a target-scope keyword.
    fn in_scope(&self, region: &Region, doc: &Document) -> bool {
        if self.scope_keywords.is_empty() {
            return true;
        }
        [&region.label, &doc.headline, &doc.body_text]
            .iter()
            .map(|s| s.to_lowercase())
            .any(|text| self.scope_keywords.iter().any(|k| text.contains(k.as_str())))
    }
}

/// Every line's mention that pairs with a price, in text order.
fn candidates(block: &str) -> Vec<Candidate<'_>> {
    commodity::mentions(block)
        .into_iter()
        .filter_map(|mention| {
            let price = price::parse_near(block, mention.start)?;
            let lo = line_start(block, mention.start.min(price.span.start));
            let hi = line_end(block, mention.start.max(price.span.end));
            Some(Candidate {
                mention,
                price,
                fragment: block[lo..hi].trim(),
            })
        })
        .collect()
}

/// First occurrence of each `(documentUrl, commodity, priceValue)` wins.
pub fn dedup(records: Vec<PriceRecord>) -> Vec<PriceRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let (url, commodity, value) = r.dedup_key();
            seen.insert((url.to_string(), commodity, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Commodity, ContextType, PriceUnit};

    fn extractor() -> Extractor {
        Extractor::new(&Settings::default()).unwrap()
    }

    fn extractor_since(since: &str) -> Extractor {
        let settings = Settings {
            since: Some(since.to_string()),
            ..Settings::default()
        };
        Extractor::new(&settings).unwrap()
    }

    fn doc(headline: &str, body: &str) -> Document {
        Document {
            headline: headline.to_string(),
            body_text: body.to_string(),
            published_at: Some("2025-08-26T10:00:00+07:00".to_string()),
            document_url: "https://www.detik.com/jabar/berita/d-1".to_string(),
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.txt", name)).unwrap()
    }

    #[test]
    fn bullet_then_price_line() {
        let recs = extractor().extract(
            Source::Detik,
            &doc("Harga beras di Bandung", "1. Beras Medium\nRp13.500 / kg"),
        );
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.commodity, Commodity::BerasMedium);
        assert_eq!(r.price_value, 13500);
        assert_eq!(r.price_unit, PriceUnit::PerKilogram);
        assert_eq!(r.context_type, ContextType::Retail);
        assert_eq!(r.raw_text, "1. Beras Medium | Rp13.500 / kg");
    }

    #[test]
    fn every_line_keeps_its_own_price() {
        let ex = extractor();
        let pairs = |body: &str| -> Vec<(Commodity, u64)> {
            ex.extract(Source::Detik, &doc("Harga beras di Bandung", body))
                .iter()
                .map(|r| (r.commodity, r.price_value))
                .collect()
        };

        let grades = pairs("Beras premium Rp15.500/kg\nBeras medium Rp13.500/kg");
        assert!(grades.contains(&(Commodity::BerasPremium, 15500)));
        assert!(grades.contains(&(Commodity::BerasMedium, 13500)));
        assert_eq!(grades.len(), 2);

        let mixed = pairs("Harga beras eceran Rp14.000/kg\nGabah kering panen Rp6.200/kg");
        assert!(mixed.contains(&(Commodity::BerasGeneric, 14000)));
        assert!(mixed.contains(&(Commodity::Gabah, 6200)));
        assert_eq!(mixed.len(), 2);
    }

    #[test]
    fn unpriced_grade_does_not_borrow_next_line() {
        let recs = extractor().extract(
            Source::Detik,
            &doc("Harga beras di Bandung", "Stok beras medium aman\nBeras premium Rp15.500/kg"),
        );
        let pairs: Vec<(Commodity, u64)> = recs.iter().map(|r| (r.commodity, r.price_value)).collect();
        assert_eq!(pairs, vec![(Commodity::BerasPremium, 15500)]);
    }

    #[test]
    fn empty_url_yields_nothing() {
        let mut d = doc("Harga beras Bandung", "1. Beras Medium\nRp13.500 / kg");
        d.document_url = "  ".to_string();
        assert!(extractor().extract(Source::Detik, &d).is_empty());
    }

    #[test]
    fn gabah_is_producer_context() {
        let recs = extractor().extract(
            Source::Detik,
            &doc("Harga gabah di Jawa Barat", "Gabah Kering Panen (GKP) tingkat petani Rp6.200/kg"),
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].commodity, Commodity::Gabah);
        assert_eq!(recs[0].context_type, ContextType::Producer);
        assert_eq!(recs[0].price_value, 6200);
    }

    #[test]
    fn sembako_list() {
        let recs = extractor().extract(
            Source::Detik,
            &doc("Daftar Harga Sembako di Kota Bandung", &fixture("sembako_bandung")),
        );
        let pairs: Vec<(Commodity, u64)> = recs.iter().map(|r| (r.commodity, r.price_value)).collect();
        assert!(pairs.contains(&(Commodity::BerasMedium, 13500)));
        assert!(pairs.contains(&(Commodity::BerasPremium, 15500)));
        assert!(pairs.contains(&(Commodity::Gabah, 6800)));
        // cooking oil is not a commodity of interest
        assert!(recs.iter().all(|r| r.price_value != 18000));
        assert!(recs.iter().all(|r| r.region == "Bandung"));
        let gabah = recs.iter().find(|r| r.commodity == Commodity::Gabah).unwrap();
        assert_eq!(gabah.context_type, ContextType::Producer);
    }

    #[test]
    fn no_mispairing_across_bullets() {
        let recs = extractor().extract(
            Source::Detik,
            &doc("Harga beras di Bandung", &fixture("sembako_bandung")),
        );
        assert!(!recs
            .iter()
            .any(|r| r.commodity == Commodity::BerasPremium && r.price_value == 13500));
    }

    #[test]
    fn dedup_key_ignores_raw_text() {
        let body = "Beras medium dijual Rp13.500 per kg.\nDi pasar lain beras medium juga Rp13.500/kg";
        let recs = extractor().extract(Source::Detik, &doc("Harga beras Bandung", body));
        let medium: Vec<_> = recs
            .iter()
            .filter(|r| r.commodity == Commodity::BerasMedium)
            .collect();
        assert_eq!(medium.len(), 1);
    }

    #[test]
    fn unique_triples_and_positive_prices() {
        let recs = extractor().extract(
            Source::Detik,
            &doc("Daftar Harga Sembako di Kota Bandung", &fixture("sembako_bandung")),
        );
        let mut keys = HashSet::new();
        for r in &recs {
            assert!(r.price_value > 0);
            assert!(keys.insert((r.document_url.clone(), r.commodity, r.price_value)));
        }
    }

    #[test]
    fn idempotent() {
        let ex = extractor();
        let d = doc("Daftar Harga Sembako di Kota Bandung", &fixture("sembako_bandung"));
        assert_eq!(ex.extract(Source::Detik, &d), ex.extract(Source::Detik, &d));
    }

    #[test]
    fn off_topic_document_dropped() {
        let settings = Settings {
            default_region: "Tidak diketahui".to_string(),
            ..Settings::default()
        };
        let ex = Extractor::new(&settings).unwrap();
        let recs = ex.extract(
            Source::Detik,
            &doc("Harga beras di Thailand melonjak", &fixture("off_topic")),
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn default_region_in_scope_keeps_document() {
        // the fallback label itself satisfies the scope keywords
        let recs = extractor().extract(
            Source::Detik,
            &doc("Harga beras di Thailand melonjak", &fixture("off_topic")),
        );
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.region == "Bandung"));
    }

    #[test]
    fn missing_date_with_since_yields_nothing() {
        let ex = extractor_since("2025-08-01");
        let mut d = doc("Harga beras Bandung", "1. Beras Medium\nRp13.500 / kg");
        d.published_at = None;
        assert!(ex.extract(Source::Detik, &d).is_empty());
    }

    #[test]
    fn since_is_strict() {
        let ex = extractor_since("2025-08-26T10:00:00+07:00");
        let d = doc("Harga beras Bandung", "1. Beras Medium\nRp13.500 / kg");
        assert!(ex.extract(Source::Detik, &d).is_empty());

        let ex = extractor_since("2025-08-25");
        assert_eq!(ex.extract(Source::Detik, &d).len(), 1);
    }

    #[test]
    fn missing_date_without_since_is_kept() {
        let mut d = doc("Harga beras Bandung", "1. Beras Medium\nRp13.500 / kg");
        d.published_at = None;
        let recs = extractor().extract(Source::Detik, &d);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].published_at.is_none());
    }

    #[test]
    fn region_stamped_once_from_dateline() {
        let body = "Cimahi - Harga beras naik di Kota Bandung.\nBeras premium Rp15.000/kg";
        let recs = extractor().extract(Source::Detik, &doc("Harga beras", body));
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.region == "Cimahi"));
    }

    #[test]
    fn garbage_input_is_empty_not_error() {
        let ex = extractor();
        assert!(ex.extract(Source::Detik, &doc("", "")).is_empty());
        assert!(ex
            .extract(Source::Detik, &doc("Bandung", "Rp Rp Rp 1.2.3 ,,, beras | | |"))
            .is_empty());
    }
}
