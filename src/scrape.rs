//! Scraping collaborator: resolves a [`ScrapeTarget`] into an [`Article`].
//!
//! Targets that already carry title and body are converted locally without
//! touching the network. Everything else goes through an HTTP fetch and a
//! best-effort extraction of title, paragraph text, meta keywords, and a
//! publish date from the page.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::{Article, ScrapeTarget};

/// Capability seam for article resolution.
///
/// One production implementation ([`HttpScraper`]); tests substitute their
/// own doubles.
#[async_trait]
pub trait Scrape: Send + Sync {
    async fn scrape(&self, target: &ScrapeTarget) -> Result<Article, ScrapeError>;
}

/// HTTP-backed scraper.
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    /// Builds a scraper whose requests are bounded by `timeout`.
    pub fn new(timeout: std::time::Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Scrape for HttpScraper {
    async fn scrape(&self, target: &ScrapeTarget) -> Result<Article, ScrapeError> {
        if target.is_scraped() {
            debug!(url = %target.url, "target pre-scraped, converting locally");
            return target.to_article(Utc::now());
        }

        let html = self
            .client
            .get(&target.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_article(&target.url, &target.article_id, &html)
    }
}

/// Pulls article fields out of raw HTML.
///
/// Kept synchronous and separate from the fetch: `scraper::Html` is not
/// `Send` and must not live across an await point.
fn extract_article(url: &str, article_id: &str, html: &str) -> Result<Article, ScrapeError> {
    let document = Html::parse_document(html);

    let title = select_text(&document, "title")?
        .or(select_attr(&document, r#"meta[property="og:title"]"#, "content")?)
        .unwrap_or_default();

    let body_selector = parse_selector("p")?;
    let body = document
        .select(&body_selector)
        .map(|p| p.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if body.is_empty() {
        return Err(ScrapeError::EmptyContent {
            url: url.to_string(),
        });
    }

    let keywords = select_attr(&document, r#"meta[name="keywords"]"#, "content")?
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|kw| !kw.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let date = select_attr(&document, r#"meta[property="article:published_time"]"#, "content")?
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(Article {
        id: article_id.to_string(),
        url: url.to_string(),
        title: title.trim().to_string(),
        body,
        keywords,
        date,
    })
}

fn parse_selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(e.to_string()))
}

/// Joined text of the first element matching `css`, if any.
fn select_text(document: &Html, css: &str) -> Result<Option<String>, ScrapeError> {
    let selector = parse_selector(css)?;
    Ok(document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ")))
}

/// Value of `attr` on the first element matching `css`, if any.
fn select_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>, ScrapeError> {
    let selector = parse_selector(css)?;
    Ok(document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string))
}
