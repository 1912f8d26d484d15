// src/services/source.rs

//! Publication source adapter.
//!
//! The pipeline only sees the [`SourceAdapter`] trait. [`HttpSourceAdapter`]
//! reads the announcement listing and pages over plain HTTP.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ItemDetail, SourceConfig};
use crate::utils::{normalize_whitespace, resolve_url};

/// Where announcements come from.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Announcement references, most current first, without duplicates.
    async fn discover(&self) -> Result<Vec<String>>;

    /// Title and attachment locator of one announcement.
    async fn fetch_detail(&self, source_ref: &str) -> Result<ItemDetail>;

    /// Raw bytes of an attachment.
    async fn fetch_attachment(&self, attachment_ref: &str) -> Result<Vec<u8>>;
}

/// Source adapter that scrapes the announcement pages over HTTP.
pub struct HttpSourceAdapter {
    client: Client,
    listing_url: Url,
    item_link: Regex,
    fallback_title: String,
}

impl HttpSourceAdapter {
    /// Create an adapter from source settings and a configured client.
    pub fn new(config: &SourceConfig, client: Client) -> Result<Self> {
        let listing_url = Url::parse(&config.listing_url)?;
        let item_link = Regex::new(&config.item_link_pattern)
            .map_err(|e| AppError::pattern(&config.item_link_pattern, e))?;

        Ok(Self {
            client,
            listing_url,
            item_link,
            fallback_title: config.fallback_title.clone(),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceAdapter for HttpSourceAdapter {
    async fn discover(&self) -> Result<Vec<String>> {
        let html = self.fetch_text(self.listing_url.as_str()).await?;
        let links = extract_item_links(&html, &self.listing_url, &self.item_link)?;
        log::debug!(
            "Discovered {} announcement link(s) on {}",
            links.len(),
            self.listing_url
        );
        Ok(links)
    }

    async fn fetch_detail(&self, source_ref: &str) -> Result<ItemDetail> {
        let page_url = Url::parse(source_ref)?;
        let html = self.fetch_text(source_ref).await?;
        let document = Html::parse_document(&html);

        Ok(ItemDetail {
            raw_title: extract_title(&document, &self.fallback_title)?,
            attachment_ref: extract_attachment(&document, &page_url)?,
        })
    }

    async fn fetch_attachment(&self, attachment_ref: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(attachment_ref)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::source(format!("selector {s}"), format!("{e:?}")))
}

/// Absolute announcement links on a listing page, in page order, deduplicated.
pub fn extract_item_links(html: &str, base: &Url, item_link: &Regex) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let anchors = parse_selector("a[href]")?;

    let mut links: Vec<String> = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let link = resolve_url(base, href.trim());
        if item_link.is_match(&link) && !links.contains(&link) {
            links.push(link);
        }
    }
    Ok(links)
}

/// First non-empty heading, then the document title, then the fallback.
fn extract_title(document: &Html, fallback: &str) -> Result<String> {
    let headings = parse_selector("h1, h2, .title, .news-title")?;
    let title_tag = parse_selector("title")?;

    let heading = document
        .select(&headings)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty());
    if let Some(title) = heading {
        return Ok(title);
    }

    let title = document
        .select(&title_tag)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    Ok(title)
}

/// Locate the attached document on an announcement page.
///
/// Preference order: a link to a `.pdf`, a link into a download-like path,
/// then an embedded viewer pointing at a `.pdf`.
fn extract_attachment(document: &Html, page_url: &Url) -> Result<Option<String>> {
    let pdf_link = RegexBuilder::new(r"\.pdf($|\?)")
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::pattern(r"\.pdf($|\?)", e))?;
    let download_link = RegexBuilder::new(r"/(media|files|download|news/download)/")
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::pattern("download path", e))?;

    let anchors = parse_selector("a[href]")?;
    let hrefs: Vec<String> = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| resolve_url(page_url, href.trim()))
        .collect();

    if let Some(href) = hrefs.iter().find(|h| pdf_link.is_match(h)) {
        return Ok(Some(href.clone()));
    }
    if let Some(href) = hrefs.iter().find(|h| download_link.is_match(h)) {
        return Ok(Some(href.clone()));
    }

    for (selector, attr) in [
        (r#"iframe[src*=".pdf"]"#, "src"),
        (r#"embed[src*=".pdf"]"#, "src"),
        (r#"object[data*=".pdf"]"#, "data"),
    ] {
        let sel = parse_selector(selector)?;
        let found = document
            .select(&sel)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty());
        if let Some(value) = found {
            return Ok(Some(resolve_url(page_url, value)));
        }
    }

    Ok(None)
}
