use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
/// detik article paths carry a numeric id: `/jabar/berita/d-7512345/...`.
static ARTICLE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/d-\d+").unwrap());

/// Listing page `page` (1-based) of a tag or channel.
pub fn listing_url(base: &str, page: usize) -> String {
    format!("{}?page={}", base.trim_end_matches('?'), page)
}

/// Absolute, query-free article URLs linked from a listing page, in page
/// order. With a title filter, only anchors whose text matches are kept.
pub fn article_links(html: &str, page_url: &Url, title_filter: Option<&Regex>) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !ARTICLE_PATH_RE.is_match(href) {
            continue;
        }
        if let Some(filter) = title_filter {
            let title = anchor.text().collect::<Vec<_>>().join(" ");
            if !filter.is_match(&title) {
                continue;
            }
        }
        let Ok(mut url) = page_url.join(href) else {
            continue;
        };
        url.set_query(None);
        url.set_fragment(None);
        urls.push(url.to_string());
    }
    urls
}

/// Drops repeats, keeping the first occurrence of each URL.
pub fn unique_urls(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> String {
        std::fs::read_to_string("tests/fixtures/detik_listing.html").unwrap()
    }

    fn page() -> Url {
        Url::parse("https://www.detik.com/tag/harga-beras-di-bandung?page=1").unwrap()
    }

    #[test]
    fn collects_article_links_without_query() {
        let urls = article_links(&listing(), &page(), None);
        assert_eq!(
            urls,
            vec![
                "https://www.detik.com/jabar/berita/d-7512345/harga-beras-medium-di-bandung-naik",
                "https://www.detik.com/jabar/bisnis/d-7512399/daftar-harga-sembako-hari-ini",
                "https://www.detik.com/jabar/berita/d-7512345/harga-beras-medium-di-bandung-naik",
                "https://www.detik.com/jabar/sepakbola/d-7511111/persib-menang",
            ]
        );
    }

    #[test]
    fn title_filter_keeps_matching_anchors() {
        let filter = Regex::new(r"(?i)harga beras|daftar harga|sembako|bandung").unwrap();
        let urls = unique_urls(article_links(&listing(), &page(), Some(&filter)));
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| !u.contains("persib")));
    }

    #[test]
    fn unique_keeps_first_seen_order() {
        let urls = unique_urls(
            ["b", "a", "b", "c", "a"].into_iter().map(String::from),
        );
        assert_eq!(urls, vec!["b", "a", "c"]);
    }

    #[test]
    fn listing_pages_are_numbered() {
        assert_eq!(
            listing_url("https://www.detik.com/jabar/berita", 2),
            "https://www.detik.com/jabar/berita?page=2"
        );
    }
}
