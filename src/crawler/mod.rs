pub mod article;
pub mod seed;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use crate::parser::extract::Extractor;
use crate::record::{PriceRecord, Source};
use crate::store;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;
/// Pause after each listing page.
const LISTING_DELAY: Duration = Duration::from_millis(400);
/// Pause after each article, inside its concurrency slot.
const ARTICLE_DELAY: Duration = Duration::from_millis(250);

/// Crawl stats returned after completion.
pub struct CrawlStats {
    pub seeded: usize,
    pub ok: usize,
    pub errors: usize,
    pub records: usize,
}

/// HTTP client with the configured user agent, timeout and retry policy.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Fetcher { client })
    }

    /// GET a page body, retrying 429 and 5xx with exponential backoff.
    pub async fn get(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable || attempt == MAX_RETRIES {
                return Err(ScrapeError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
            warn!(
                "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
                status.as_u16(),
                url,
                attempt + 1,
                MAX_RETRIES,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// Article URLs from the seed tags, then the filtered fallback channel.
pub async fn seed_urls(fetcher: &Fetcher, settings: &Settings, pages: usize) -> Result<Vec<String>> {
    let title_filter = Regex::new(&settings.title_filter)?;
    let mut urls = Vec::new();

    for tag in &settings.seed_tags {
        for page in 1..=pages {
            urls.extend(listing_links(fetcher, &seed::listing_url(tag, page), None).await);
            tokio::time::sleep(LISTING_DELAY).await;
        }
    }
    let channel = seed::listing_url(&settings.fallback_channel, 1);
    urls.extend(listing_links(fetcher, &channel, Some(&title_filter)).await);
    tokio::time::sleep(LISTING_DELAY).await;

    let urls = seed::unique_urls(urls);
    info!("Seeded {} article URLs", urls.len());
    Ok(urls)
}

/// A listing that fails to load contributes nothing.
async fn listing_links(fetcher: &Fetcher, page_url: &str, title_filter: Option<&Regex>) -> Vec<String> {
    let Ok(parsed) = Url::parse(page_url) else {
        warn!("Skipping malformed listing URL {}", page_url);
        return Vec::new();
    };
    match fetcher.get(page_url).await {
        Ok(html) => {
            let links = seed::article_links(&html, &parsed, title_filter);
            debug!(page = page_url, links = links.len(), "listing harvested");
            links
        }
        Err(e) => {
            warn!("Listing {} failed: {}", page_url, e);
            Vec::new()
        }
    }
}

/// Fetch, read and extract every URL concurrently, streaming records to `out`
/// as each article finishes.
pub async fn crawl_articles<W: Write>(
    fetcher: &Fetcher,
    extractor: Arc<Extractor>,
    urls: Vec<String>,
    concurrency: usize,
    out: &mut W,
) -> Result<CrawlStats> {
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let seeded = urls.len();

    let pb = ProgressBar::new(seeded as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Workers send results, this task is the only writer
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(String, Result<Vec<PriceRecord>>)>(concurrency * 2);

    for url in urls {
        let fetcher = fetcher.clone();
        let extractor = Arc::clone(&extractor);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let result = read_and_extract(&fetcher, &extractor, &url).await;
            let _ = tx.send((url, result)).await;
            tokio::time::sleep(ARTICLE_DELAY).await;
        });
    }
    drop(tx);

    let mut stats = CrawlStats {
        seeded,
        ok: 0,
        errors: 0,
        records: 0,
    };
    while let Some((url, result)) = rx.recv().await {
        match result {
            Ok(records) => {
                stats.ok += 1;
                stats.records += records.len();
                if records.is_empty() {
                    debug!("- 0 from {}", url);
                } else {
                    info!("+ {} from {}", records.len(), url);
                }
                store::write_records(out, &records)?;
            }
            Err(e) => {
                stats.errors += 1;
                warn!("Skipping {}: {}", url, e);
            }
        }
        pb.inc(1);
    }
    out.flush()?;

    pb.finish_and_clear();
    info!(
        "Crawled {} articles ({} ok, {} errors), {} records",
        stats.seeded, stats.ok, stats.errors, stats.records
    );
    Ok(stats)
}

/// The AMP rendition supplies the body when it loads; headline and date
/// always come from the canonical page.
async fn read_and_extract(fetcher: &Fetcher, extractor: &Extractor, url: &str) -> Result<Vec<PriceRecord>> {
    let page_url = Url::parse(url).map_err(|_| ScrapeError::InvalidUrl(url.to_string()))?;
    let html = fetcher.get(url).await?;
    let mut page = article::read_article(&html, &page_url);

    if let Some(amp_url) = page.amp_url.take() {
        match fetcher.get(&amp_url).await {
            Ok(amp) => {
                let body = article::body_text(&amp);
                if !body.is_empty() {
                    page.document.body_text = body;
                }
            }
            Err(e) => debug!("AMP {} unavailable, using canonical page: {}", amp_url, e),
        }
    }

    Ok(extractor.extract(Source::Detik, &page.document))
}
