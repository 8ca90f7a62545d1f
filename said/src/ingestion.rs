use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{PolitenessConfig, SourcesConfig};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::scraping;
use crate::sources::{self, Source};

pub const DEFAULT_SEARCH_URL: &str = "https://news.google.com/rss/search?hl=en-US&gl=US&ceid=US:en";
pub const DEFAULT_TOP_STORIES_URL: &str = "https://news.google.com/rss?hl=en-US&gl=US&ceid=US:en";

/// Feed text shorter than this is treated as a teaser and the linked page is scraped.
const SHORT_CONTENT_CHARS: usize = 500;

/// Supplies the article texts behind one source.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch_articles(&self, source: &Source) -> Result<Vec<String>>;
}

/// Reads news search feeds and site feeds over HTTP.
pub struct NewsFetcher {
    client: Client,
    search_url: String,
    top_stories_url: String,
    sites: HashMap<String, String>,
    max_retries: u32,
    concurrency: usize,
}

impl NewsFetcher {
    pub fn new(sources: &SourcesConfig, politeness: &PolitenessConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(politeness.fetch_timeout())
            .user_agent(politeness.agent())
            .build()
            .context("failed to build reqwest client")?;

        let sites = sources::sites(sources)
            .into_iter()
            .map(|site| (site.name, site.url))
            .collect();

        Ok(Self {
            client,
            search_url: sources.search_url.clone().unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            top_stories_url: sources
                .top_stories_url
                .clone()
                .unwrap_or_else(|| DEFAULT_TOP_STORIES_URL.to_string()),
            sites,
            max_retries: politeness.retries(),
            concurrency: politeness.concurrency(),
        })
    }

    /// Feed URL behind a source. A blank search term reads the top stories.
    pub fn feed_url(&self, source: &Source) -> Result<String> {
        match source {
            Source::SearchTerm(term) if term.trim().is_empty() => Ok(self.top_stories_url.clone()),
            Source::SearchTerm(term) => {
                let mut url = url::Url::parse(&self.search_url)
                    .with_context(|| format!("invalid search URL: {}", self.search_url))?;
                url.query_pairs_mut().append_pair("q", term);
                Ok(url.to_string())
            }
            Source::Site(name) => self
                .sites
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no feed configured for site '{}'", name)),
        }
    }

    /// Fetches a feed and parses it, retrying server errors, rate limiting
    /// and network failures with exponential backoff.
    pub async fn fetch_feed(&self, url: &str) -> Result<Feed> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s, 4s...
                info!("Retrying feed fetch for {} (attempt {}/{}) after {:?}...", url, attempt, self.max_retries, backoff);
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().await.context("failed to read response body")?;
                        let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;
                        return Ok(feed);
                    } else if status.is_server_error() {
                        last_error = Some(anyhow::anyhow!("server error: {}", status));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                    } else {
                        // Other client errors will not go away on retry
                        return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
                    }
                }
                Err(e) => {
                    last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
    }

    /// Plain text of one feed entry, scraping the linked page when the feed
    /// only carries a teaser.
    async fn entry_text(&self, entry: &Entry) -> Option<String> {
        let html = entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
            .unwrap_or_default();
        let mut text = scraping::html_to_text(&html);

        let teaser_link = entry
            .links
            .first()
            .map(|l| l.href.as_str())
            .filter(|_| text.len() < SHORT_CONTENT_CHARS);
        if let Some(url) = teaser_link {
            debug!("Content short ({}), attempting to scrape: {}", text.len(), url);
            match scraping::scrape_article_text(&self.client, url).await {
                Ok(scraped) if scraped.len() > text.len() => text = scraped,
                Ok(_) => debug!("Scraping returned less content, keeping feed text for {}", url),
                Err(e) => warn!("Failed to scrape {}: {}", url, e),
            }
        }

        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[async_trait]
impl ArticleFetcher for NewsFetcher {
    async fn fetch_articles(&self, source: &Source) -> Result<Vec<String>> {
        let url = self.feed_url(source)?;
        let feed = self
            .fetch_feed(&url)
            .await
            .with_context(|| format!("failed to read feed for {} ({})", source, url))?;
        info!("Fetched feed for {}: {} items", source, feed.entries.len());

        // `buffered` keeps entry order while pages download concurrently.
        // The futures are built up front so the stream stays `Send`.
        let pending: Vec<_> = feed.entries.iter().map(|entry| self.entry_text(entry)).collect();
        let texts: Vec<Option<String>> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(texts.into_iter().flatten().collect())
    }
}
