use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{Category, NewsItem};

/// Where fresh news comes from.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed into classified items (unsorted, untruncated).
    async fn fetch(&self) -> Result<Vec<NewsItem>>;
}

/// RSS/Atom feed fetched over HTTP
pub struct RssFeedSource {
    url: String,
    source_name: String,
    client: Client,
}

impl RssFeedSource {
    pub fn new(url: impl Into<String>, source_name: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("NextStep/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            url: url.into(),
            source_name: source_name.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let feed = fetch_and_parse_feed(&self.client, &self.url).await?;
        info!(url = %self.url, entries = feed.entries.len(), "news: fetched feed");
        Ok(items_from_feed(&feed, &self.source_name, Utc::now()))
    }
}

/// Fetches a feed from the given URL and parses it. A single attempt: the
/// gateway owns the only fallback.
pub async fn fetch_and_parse_feed(client: &Client, url: &str) -> Result<Feed> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("network error fetching feed {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("feed fetch failed with status: {}", status);
    }

    let bytes = response.bytes().await.context("failed to read response body")?;
    parse_feed(bytes.as_ref())
}

pub fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    parser::parse(bytes).context("failed to parse feed")
}

/// Turn feed entries into news items. Entries without a link are skipped; entries
/// without a date are stamped with `fetched_at`.
pub fn items_from_feed(feed: &Feed, default_source: &str, fetched_at: DateTime<Utc>) -> Vec<NewsItem> {
    let source = feed
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_source.to_string());

    feed.entries
        .iter()
        .filter_map(|entry| item_from_entry(entry, &source, fetched_at))
        .collect()
}

fn item_from_entry(entry: &Entry, source: &str, fetched_at: DateTime<Utc>) -> Option<NewsItem> {
    let title = entry
        .title
        .as_ref()
        .map(|t| strip_html(&t.content))
        .unwrap_or_default();

    let url = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
    if url.is_empty() {
        debug!("Skipping entry without URL: {:?}", title);
        return None;
    }

    let description = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .map(|d| strip_html(&d))
        .unwrap_or_default();

    let published_at = entry.published.or(entry.updated).unwrap_or(fetched_at);
    let id = if entry.id.is_empty() { url.clone() } else { entry.id.clone() };

    Some(NewsItem {
        id,
        category: Category::classify(&title, &description),
        title,
        description,
        url,
        published_at,
        source: source.to_string(),
    })
}

/// Text content of an HTML fragment, whitespace collapsed.
fn strip_html(html: &str) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>PIB India</title>
    <link>https://pib.gov.in</link>
    <description>Press releases</description>
    <item>
      <title>PSUs announce campus recruitment drive</title>
      <link>https://pib.gov.in/1</link>
      <guid>pib-1</guid>
      <description><![CDATA[<p>ONGC, BHEL and <b>NTPC</b> to recruit engineers.</p>]]></description>
      <pubDate>Mon, 02 Jun 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>AICTE approves new technical courses</title>
      <link>https://pib.gov.in/2</link>
      <guid>pib-2</guid>
      <description>Courses in AI, data science and green technologies.</description>
      <pubDate>Sun, 01 Jun 2025 08:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Entry with no link</title>
      <description>Should be skipped</description>
    </item>
    <item>
      <title>Undated scholarship notice</title>
      <link>https://pib.gov.in/3</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_classifies_and_skips_linkless_entries() {
        let feed = parse_feed(RSS.as_bytes()).expect("parse");
        let fetched_at = Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap();
        let items = items_from_feed(&feed, "Fallback", fetched_at);

        assert_eq!(items.len(), 3);

        let jobs = &items[0];
        assert_eq!(jobs.id, "pib-1");
        assert_eq!(jobs.category, Category::Job);
        assert_eq!(jobs.description, "ONGC, BHEL and NTPC to recruit engineers.");
        assert_eq!(jobs.source, "PIB India");
        assert_eq!(
            jobs.published_at,
            Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
        );

        assert_eq!(items[1].category, Category::Educational);
        assert_eq!(items[2].published_at, fetched_at);
    }

    #[test]
    fn rejects_non_feed_documents() {
        assert!(parse_feed(b"<html><body>not a feed</body></html>").is_err());
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(strip_html("<p>a\n  <i>b</i></p>  c"), "a b c");
        assert_eq!(strip_html("plain text"), "plain text");
    }
}
