mod config;
mod crawler;
mod error;
mod parser;
mod record;
mod store;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::crawler::{article, Fetcher};
use crate::parser::board::{self, BoardKind};
use crate::parser::extract::Extractor;
use crate::record::{Document, PriceRecord, Source};

#[derive(Parser)]
#[command(name = "beras_scraper", about = "Rice and paddy price scraper for Bandung / West Java")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed article URLs from news listings, fetch and extract prices
    Crawl {
        #[arg(short, long, default_value = store::DEFAULT_OUT)]
        out: PathBuf,
        /// Listing pages per seed tag (default: from settings)
        #[arg(short, long)]
        pages: Option<usize>,
        /// Keep only documents published strictly after this date/time
        #[arg(long)]
        since: Option<String>,
    },
    /// Extract prices from already-fetched documents (NDJSON)
    Extract {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "data/prices.ndjson")]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "detik")]
        source: Source,
        #[arg(long)]
        since: Option<String>,
    },
    /// Parse a government price board (saved page text, or fetched live)
    Board {
        #[arg(short, long, value_enum)]
        kind: BoardKind,
        /// Saved page text (default: fetch --url)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Saved comparison-table text, used when the main board yields nothing
        #[arg(long)]
        varians: Option<PathBuf>,
        /// Page URL recorded on each row (default: the board's own address)
        #[arg(long)]
        url: Option<String>,
        /// Observation date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(short, long, default_value = "data/board_prices.ndjson")]
        out: PathBuf,
    },
    /// Price summary per commodity and region
    Stats {
        #[arg(short, long, default_value = store::DEFAULT_OUT)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Crawl { out, pages, since } => {
            if since.is_some() {
                settings.since = since;
            }
            let extractor = Arc::new(Extractor::new(&settings)?);
            let fetcher = Fetcher::new(&settings)?;
            let pages = pages.unwrap_or(settings.listing_pages);

            let urls = crawler::seed_urls(&fetcher, &settings, pages).await?;
            if urls.is_empty() {
                println!("No article URLs found on the seed listings.");
                return Ok(());
            }
            println!("Crawling {} articles (streaming to {})...", urls.len(), out.display());
            let mut writer = store::create_output(&out)?;
            let stats =
                crawler::crawl_articles(&fetcher, extractor, urls, settings.concurrency, &mut writer)
                    .await?;
            println!(
                "Done: {} articles ({} ok, {} errors), {} price records.",
                stats.seeded, stats.ok, stats.errors, stats.records
            );
            Ok(())
        }
        Commands::Extract { input, out, source, since } => {
            if since.is_some() {
                settings.since = since;
            }
            let extractor = Extractor::new(&settings)?;
            let docs = store::read_documents(store::open_input(&input)?)?;
            if docs.is_empty() {
                println!("No documents in {}.", input.display());
                return Ok(());
            }
            println!("Extracting from {} documents...", docs.len());
            let mut writer = store::create_output(&out)?;
            let count = extract_documents(&extractor, source, &docs, &mut writer)?;
            println!("Saved {} price records to {}.", count, out.display());
            Ok(())
        }
        Commands::Board { kind, input, varians, url, date, out } => {
            let observed = date.unwrap_or_else(|| Local::now().date_naive());
            let live = input.is_none();
            let fetcher = Fetcher::new(&settings)?;
            let url = url.unwrap_or_else(|| kind.default_url().to_string());

            let text = match &input {
                Some(path) => std::fs::read_to_string(path)?,
                None => article::body_text(&fetcher.get(&url).await?),
            };
            let mut records = board::parse_board(kind, &text, &url, observed);

            if records.is_empty() && kind == BoardKind::Sibapokting {
                let fallback = BoardKind::SibapoktingVarians;
                let fallback_text = match (&varians, live) {
                    (Some(path), _) => Some(std::fs::read_to_string(path)?),
                    (None, true) => Some(article::body_text(&fetcher.get(fallback.default_url()).await?)),
                    (None, false) => None,
                };
                if let Some(text) = fallback_text {
                    tracing::info!("Main board empty, using comparison table");
                    records = board::parse_board(fallback, &text, fallback.default_url(), observed);
                }
            }

            let mut writer = store::create_output(&out)?;
            store::write_records(&mut writer, &records)?;
            writer.flush()?;
            for r in &records {
                let het = r
                    .ceiling_price
                    .map(|h| format!(" (HET {})", h))
                    .unwrap_or_default();
                println!("  {:<14} {:>7} {}{}", r.commodity.to_string(), r.price_value, r.price_unit.suffix(), het);
            }
            println!("Saved {} board records to {}.", records.len(), out.display());
            Ok(())
        }
        Commands::Stats { input } => {
            let records = store::read_records(store::open_input(&input)?)?;
            if records.is_empty() {
                println!("No price records in {}.", input.display());
                return Ok(());
            }
            print_stats(&records);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_elapsed(elapsed));
    }

    result
}

fn extract_documents<W: Write>(
    extractor: &Extractor,
    source: Source,
    docs: &[Document],
    out: &mut W,
) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut count = 0;
    for chunk in docs.chunks(500) {
        for records in parser::process_batch(extractor, source, chunk) {
            count += records.len();
            store::write_records(out, &records)?;
        }
        pb.inc(chunk.len() as u64);
    }
    out.flush()?;

    pb.finish_and_clear();
    Ok(count)
}

const REGION_WIDTH: usize = 20;

struct PriceSummary {
    count: usize,
    min: u64,
    max: u64,
}

fn print_stats(records: &[PriceRecord]) {
    let mut groups: BTreeMap<(String, String, &'static str), PriceSummary> = BTreeMap::new();
    for r in records {
        let key = (r.commodity.to_string(), r.region.clone(), r.price_unit.suffix());
        let entry = groups.entry(key).or_insert(PriceSummary {
            count: 0,
            min: u64::MAX,
            max: 0,
        });
        entry.count += 1;
        entry.min = entry.min.min(r.price_value);
        entry.max = entry.max.max(r.price_value);
    }

    println!(
        "{:<14} | {:<20} | {:<6} | {:>5} | {:>8} | {:>8}",
        "Commodity", "Region", "Unit", "N", "Min", "Max"
    );
    println!("{}", "-".repeat(74));
    for ((commodity, region, unit), s) in &groups {
        println!(
            "{:<14} | {:<20} | {:<6} | {:>5} | {:>8} | {:>8}",
            commodity,
            fit(region, REGION_WIDTH),
            unit,
            s.count,
            s.min,
            s.max
        );
    }

    let documents = records
        .iter()
        .map(|r| r.document_url.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    println!("\n{} records from {} documents", records.len(), documents);
}

/// Cut to `width` characters, marking the cut with an ellipsis.
fn fit(s: &str, width: usize) -> String {
    match s.char_indices().nth(width) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, _) => format!("{}m {}s", minutes, seconds),
        _ => format!("{}h {}m {}s", hours, minutes, seconds),
    }
}
