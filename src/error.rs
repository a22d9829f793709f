use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Failures outside the extraction engine: I/O, network, config, arguments.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid date '{0}' (expected YYYY-MM-DD or RFC 3339)")]
    InvalidDate(String),
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("progress bar template: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}
