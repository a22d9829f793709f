use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

use crate::record::Document;

static HEADLINE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static AMP_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="amphtml"]"#).unwrap());
/// Tried in order; the first selector that matches supplies the body.
static BODY_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["article", ".detail__body-text", "body"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
/// `(selector, attribute)` pairs for the publication timestamp, best first.
static PUBLISHED: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    [
        (r#"meta[property="article:published_time"]"#, "content"),
        (r#"meta[itemprop="datePublished"]"#, "content"),
        ("time[datetime]", "datetime"),
    ]
    .into_iter()
    .map(|(s, attr)| (Selector::parse(s).unwrap(), attr))
    .collect()
});
static INLINE_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6",
    "article", "section", "header", "footer", "blockquote", "figure", "figcaption",
];

/// An article page reduced to what the extractor needs, plus the AMP link
/// whose markup is usually cleaner.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticlePage {
    pub document: Document,
    pub amp_url: Option<String>,
}

pub fn read_article(html: &str, url: &Url) -> ArticlePage {
    let page = Html::parse_document(html);

    let headline = page
        .select(&HEADLINE)
        .next()
        .map(|h| normalize(&h.text().collect::<String>()).replace('\n', " "))
        .unwrap_or_default();

    let published_at = PUBLISHED.iter().find_map(|(selector, attr)| {
        page.select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    });

    let amp_url = page
        .select(&AMP_LINK)
        .filter_map(|link| link.value().attr("href"))
        .find_map(|href| url.join(href.trim()).ok())
        .map(|u| u.to_string());

    ArticlePage {
        document: Document {
            headline,
            body_text: body_of(&page),
            published_at,
            document_url: url.to_string(),
        },
        amp_url,
    }
}

/// Normalized body text of any page, used for the AMP rendition.
pub fn body_text(html: &str) -> String {
    body_of(&Html::parse_document(html))
}

fn body_of(page: &Html) -> String {
    let Some(root) = BODY_SELECTORS
        .iter()
        .find_map(|selector| page.select(selector).next())
    else {
        return String::new();
    };
    let mut raw = String::new();
    collect_text(root, &mut raw);
    normalize(&raw)
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(el) => {
                let block = BLOCK_ELEMENTS.contains(&el.name());
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// NBSP to space, lines trimmed, blank lines removed.
pub fn normalize(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .lines()
        .map(|l| INLINE_SPACE_RE.replace_all(l.trim(), " "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> ArticlePage {
        let html = std::fs::read_to_string("tests/fixtures/detik_article.html").unwrap();
        let url = Url::parse("https://www.detik.com/jabar/berita/d-7512345/harga-beras").unwrap();
        read_article(&html, &url)
    }

    #[test]
    fn headline_and_url() {
        let page = article();
        assert_eq!(page.document.headline, "Harga Beras Medium di Bandung Naik");
        assert_eq!(
            page.document.document_url,
            "https://www.detik.com/jabar/berita/d-7512345/harga-beras"
        );
    }

    #[test]
    fn meta_timestamp_preferred() {
        let page = article();
        assert_eq!(page.document.published_at.as_deref(), Some("2025-08-26T09:15:00+07:00"));
    }

    #[test]
    fn time_element_fallback() {
        let html = r#"<html><body><h1>x</h1><time datetime="2025-08-20 08:00:00">20 Agu</time></body></html>"#;
        let url = Url::parse("https://www.detik.com/a/d-1").unwrap();
        let page = read_article(html, &url);
        assert_eq!(page.document.published_at.as_deref(), Some("2025-08-20 08:00:00"));
    }

    #[test]
    fn amp_link_resolved() {
        assert_eq!(
            article().amp_url.as_deref(),
            Some("https://www.detik.com/jabar/berita/d-7512345/harga-beras/amp")
        );
    }

    #[test]
    fn body_lines_are_clean() {
        let body = article().document.body_text;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "Bandung - Harga beras medium di pasar tradisional Kota Bandung naik.");
        assert!(lines.contains(&"1. Beras Medium"));
        assert!(lines.contains(&"Rp13.500 / kg"));
        assert!(!body.contains('\u{a0}'));
        assert!(!body.contains("dataLayer"));
        assert!(lines.iter().all(|l| !l.is_empty() && l.trim() == *l));
    }

    #[test]
    fn empty_markup() {
        let url = Url::parse("https://www.detik.com/a/d-1").unwrap();
        let page = read_article("", &url);
        assert_eq!(page.document.headline, "");
        assert_eq!(page.document.body_text, "");
        assert!(page.document.published_at.is_none());
        assert!(page.amp_url.is_none());
    }
}
