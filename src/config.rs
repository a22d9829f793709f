use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::Result;

/// Optional settings file in the working directory (`beras.toml`, `beras.json`, ...).
const CONFIG_FILE: &str = "beras";
const ENV_PREFIX: &str = "BERAS";

const WEST_JAVA_PLACES: &[&str] = &[
    "Bandung Barat",
    "Bandung",
    "Cimahi",
    "Karawang",
    "Subang",
    "Indramayu",
    "Cirebon",
    "Garut",
    "Tasikmalaya",
    "Cianjur",
    "Sukabumi",
    "Bogor",
    "Bekasi",
    "Sumedang",
    "Majalengka",
    "Purwakarta",
    "Kuningan",
    "Pangandaran",
    "Depok",
    "Banjar",
];

/// Comma-separated environment values for these keys become lists.
const LIST_KEYS: &[&str] = &["scope_keywords", "regions", "window_sizes", "seed_tags"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RegionSpec")]
pub struct RegionEntry {
    pub name: String,
    /// Province-level entries are never given a Kota/Kabupaten prefix.
    pub province: bool,
}

/// A bare name (as in `BERAS_REGIONS=Garut,Cimahi`) is a place; the table
/// form can mark a province.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegionSpec {
    Name(String),
    Entry {
        name: String,
        #[serde(default)]
        province: bool,
    },
}

impl From<RegionSpec> for RegionEntry {
    fn from(spec: RegionSpec) -> Self {
        match spec {
            RegionSpec::Name(name) => RegionEntry::place(name.trim()),
            RegionSpec::Entry { name, province } => RegionEntry { name, province },
        }
    }
}

impl RegionEntry {
    pub fn place(name: &str) -> Self {
        RegionEntry {
            name: name.to_string(),
            province: false,
        }
    }

    pub fn province(name: &str) -> Self {
        RegionEntry {
            name: name.to_string(),
            province: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_region: String,
    /// Lowercase substrings; a document must mention one of them to be kept.
    pub scope_keywords: Vec<String>,
    /// Priority order matters: the first entry found in the text wins.
    pub regions: Vec<RegionEntry>,
    pub since: Option<String>,
    pub window_sizes: Vec<usize>,
    pub concurrency: usize,
    pub listing_pages: usize,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub seed_tags: Vec<String>,
    pub fallback_channel: String,
    pub title_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let mut regions: Vec<RegionEntry> =
            WEST_JAVA_PLACES.iter().map(|p| RegionEntry::place(p)).collect();
        regions.push(RegionEntry::province("Jawa Barat"));

        Settings {
            default_region: "Bandung".to_string(),
            scope_keywords: vec!["bandung".to_string(), "jawa barat".to_string()],
            regions,
            since: None,
            window_sizes: vec![2, 3],
            concurrency: 4,
            listing_pages: 3,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126 Safari/537.36"
                .to_string(),
            request_timeout_secs: 20,
            seed_tags: vec![
                "https://www.detik.com/tag/harga-beras-di-bandung".to_string(),
                "https://www.detik.com/tag/harga-beras-di-bandung-hari-ini".to_string(),
            ],
            fallback_channel: "https://www.detik.com/jabar/berita".to_string(),
            title_filter: r"(?i)harga beras|daftar harga|sembako|bandung".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then `beras.*` if present, then `BERAS_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(environment())
    }

    fn load_with(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(env)
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_region.trim().is_empty() {
            return Err(ConfigError::Message("default_region must not be empty".into()).into());
        }
        if !self.window_sizes.iter().any(|&n| n >= 2) {
            return Err(ConfigError::Message(
                "window_sizes needs at least one size >= 2 to pair adjacent lines".into(),
            )
            .into());
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Message("concurrency must be at least 1".into()).into());
        }
        Ok(())
    }
}

fn environment() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    #[test]
    fn environment_overrides_lists_and_scalars() {
        let s = Settings::load_with(env(&[
            ("BERAS_SCOPE_KEYWORDS", "bandung,cimahi"),
            ("BERAS_REGIONS", "Garut,Cimahi"),
            ("BERAS_WINDOW_SIZES", "2,4"),
            ("BERAS_CONCURRENCY", "8"),
            ("BERAS_DEFAULT_REGION", "Jawa Barat"),
        ]))
        .unwrap();
        assert_eq!(s.scope_keywords, vec!["bandung", "cimahi"]);
        assert_eq!(s.regions, vec![RegionEntry::place("Garut"), RegionEntry::place("Cimahi")]);
        assert_eq!(s.window_sizes, vec![2, 4]);
        assert_eq!(s.concurrency, 8);
        assert_eq!(s.default_region, "Jawa Barat");
    }

    #[test]
    fn load_without_overrides_is_default() {
        let s = Settings::load_with(env(&[])).unwrap();
        assert_eq!(s.window_sizes, Settings::default().window_sizes);
        assert_eq!(s.regions, Settings::default().regions);
    }

    #[test]
    fn invalid_override_rejected() {
        assert!(Settings::load_with(env(&[("BERAS_CONCURRENCY", "0")])).is_err());
    }

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.regions.first().map(|r| r.name.as_str()), Some("Bandung Barat"));
        assert!(s.regions.last().is_some_and(|r| r.province));
    }

    #[test]
    fn rejects_single_line_windows() {
        let s = Settings {
            window_sizes: vec![1],
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_blank_default_region() {
        let s = Settings {
            default_region: "  ".into(),
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
