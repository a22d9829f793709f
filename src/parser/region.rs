use std::sync::LazyLock;

use regex::Regex;

use super::commodity;
use super::price::CURRENCY_RE;
use crate::config::RegionEntry;
use crate::error::Result;

/// `Bandung - ...`, `Kabupaten Bandung – ...`, `Bandung, detikJabar - ...`.
/// The clause is one to four capitalized words; the outlet suffix is dropped.
static DATELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z]\p{L}*\.?(?:[ \t]+[A-Z]\p{L}*\.?){0,3})(?:,[ \t]*[^-–—\n]{1,40}?)?[ \t]*[-–—][ \t]+")
        .unwrap()
});
static TIER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(kota|kab(?:upaten|\.)?)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTier {
    City,
    Regency,
    Province,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOrigin {
    Dateline,
    Keyword,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub label: String,
    pub tier: Option<AdminTier>,
    pub origin: RegionOrigin,
}

struct PlacePattern {
    name: String,
    province: bool,
    re: Regex,
}

pub struct RegionInferrer {
    places: Vec<PlacePattern>,
    default_label: String,
}

impl RegionInferrer {
    pub fn new(entries: &[RegionEntry], default_label: &str) -> Result<Self> {
        let places = entries
            .iter()
            .map(|entry| -> Result<PlacePattern> {
                let name = regex::escape(entry.name.trim()).replace(' ', r"\s+");
                let pattern = if entry.province {
                    format!(r"(?i)\b{}\b", name)
                } else {
                    format!(r"(?i)\b(?:(kota|kab(?:upaten|\.)?)\s+)?{}\b", name)
                };
                Ok(PlacePattern {
                    name: entry.name.trim().to_string(),
                    province: entry.province,
                    re: Regex::new(&pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RegionInferrer {
            places,
            default_label: default_label.trim().to_string(),
        })
    }

    /// Dateline on the lede first, then the keyword scan, then the default.
    pub fn infer(&self, headline: &str, body: &str) -> Region {
        let lede = body
            .lines()
            .chain(headline.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        if let Some(region) = dateline(lede) {
            return region;
        }

        let text = format!("{}\n{}", headline, body);
        self.scan(&text).unwrap_or_else(|| Region {
            label: self.default_label.clone(),
            tier: None,
            origin: RegionOrigin::Default,
        })
    }

    fn scan(&self, text: &str) -> Option<Region> {
        for place in &self.places {
            let mut best: Option<AdminTier> = None;
            let mut found = false;
            for caps in place.re.captures_iter(text) {
                found = true;
                let tier = caps.get(1).map(|p| prefix_tier(p.as_str()));
                best = match (best, tier) {
                    (_, Some(AdminTier::City)) => Some(AdminTier::City),
                    (None, t) => t,
                    (b, _) => b,
                };
                if best == Some(AdminTier::City) {
                    break;
                }
            }
            if !found {
                continue;
            }

            let (label, tier) = if place.province {
                (place.name.clone(), Some(AdminTier::Province))
            } else {
                match best {
                    Some(AdminTier::City) => (format!("Kota {}", place.name), best),
                    Some(AdminTier::Regency) => (format!("Kabupaten {}", place.name), best),
                    _ => (place.name.clone(), None),
                }
            };
            return Some(Region {
                label,
                tier,
                origin: RegionOrigin::Keyword,
            });
        }
        None
    }
}

fn dateline(lede: &str) -> Option<Region> {
    let caps = DATELINE_RE.captures(lede)?;
    let clause = caps.get(1)?.as_str().trim();
    // "Beras Medium - Rp13.500" and "Gula Pasir - Rp17.000" are price lines
    let rest = &lede[caps.get(0)?.end()..];
    if commodity::classify(clause).is_some() || starts_with_figure(rest) {
        return None;
    }
    let tier = TIER_PREFIX_RE
        .captures(clause)
        .and_then(|c| c.get(1))
        .map(|p| prefix_tier(p.as_str()));
    Some(Region {
        label: clause.to_string(),
        tier,
        origin: RegionOrigin::Dateline,
    })
}

fn starts_with_figure(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit())
        || CURRENCY_RE.find(text).is_some_and(|m| m.start() == 0)
}

fn prefix_tier(prefix: &str) -> AdminTier {
    if prefix.eq_ignore_ascii_case("kota") {
        AdminTier::City
    } else {
        AdminTier::Regency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn inferrer() -> RegionInferrer {
        let s = Settings::default();
        RegionInferrer::new(&s.regions, &s.default_region).unwrap()
    }

    #[test]
    fn dateline_wins() {
        let r = inferrer().infer(
            "Harga beras di Garut naik",
            "Bandung - Harga beras medium di Kota Bandung naik.",
        );
        assert_eq!(r.label, "Bandung");
        assert_eq!(r.origin, RegionOrigin::Dateline);
    }

    #[test]
    fn dateline_drops_outlet_suffix() {
        let r = inferrer().infer("", "Kabupaten Bandung, detikJabar - Pasokan beras aman.");
        assert_eq!(r.label, "Kabupaten Bandung");
        assert_eq!(r.tier, Some(AdminTier::Regency));
    }

    #[test]
    fn price_line_is_not_a_dateline() {
        let r = inferrer().infer("", "Beras Medium - Rp13.500 / kg\ndi Kota Cimahi");
        assert_eq!(r.label, "Kota Cimahi");
        assert_eq!(r.origin, RegionOrigin::Keyword);
    }

    #[test]
    fn price_list_opening_is_not_a_dateline() {
        let r = inferrer().infer("", "Gula Pasir - Rp17.000/kg\nBeras medium Rp13.500/kg di Bandung");
        assert_eq!(r.label, "Bandung");
        assert_eq!(r.origin, RegionOrigin::Keyword);

        let r = inferrer().infer("", "Telur Ayam - 28.000 per kg\ndi Kota Cimahi");
        assert_eq!(r.label, "Kota Cimahi");
    }

    #[test]
    fn city_prefix_preferred_anywhere() {
        let r = inferrer().infer("Harga beras di Bandung", "Pedagang di Kota Bandung mengeluh.");
        assert_eq!(r.label, "Kota Bandung");
        assert_eq!(r.tier, Some(AdminTier::City));
    }

    #[test]
    fn regency_prefix() {
        let r = inferrer().infer("", "pasar di kab. garut ramai");
        assert_eq!(r.label, "Kabupaten Garut");
        assert_eq!(r.tier, Some(AdminTier::Regency));
    }

    #[test]
    fn bare_place_name() {
        let r = inferrer().infer("Stok beras Karawang aman", "");
        assert_eq!(r.label, "Karawang");
        assert_eq!(r.tier, None);
    }

    #[test]
    fn city_before_province() {
        let r = inferrer().infer("", "harga di jawa barat, khususnya subang");
        assert_eq!(r.label, "Subang");
    }

    #[test]
    fn province_only() {
        let r = inferrer().infer("", "rata-rata harga di Jawa Barat");
        assert_eq!(r.label, "Jawa Barat");
        assert_eq!(r.tier, Some(AdminTier::Province));
    }

    #[test]
    fn falls_back_to_default() {
        let r = inferrer().infer("Rice prices in Bangkok", "exporters raised quotes");
        assert_eq!(r.label, "Bandung");
        assert_eq!(r.origin, RegionOrigin::Default);
    }

    #[test]
    fn configured_order_is_priority() {
        let entries = vec![RegionEntry::place("Garut"), RegionEntry::place("Bandung")];
        let inf = RegionInferrer::new(&entries, "Lainnya").unwrap();
        let r = inf.infer("", "dari Bandung ke Garut");
        assert_eq!(r.label, "Garut");
    }
}
