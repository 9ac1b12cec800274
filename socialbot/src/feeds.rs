use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Read-only projection of a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogPost {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
}

impl BlogPost {
    /// Entries without a publish (or update) date are treated as published now.
    fn from_entry(entry: Entry, now: DateTime<Utc>) -> Self {
        BlogPost {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            link: entry.links.into_iter().next().map(|l| l.href).unwrap_or_default(),
            published: entry.published.or(entry.updated).unwrap_or(now),
        }
    }
}

#[async_trait::async_trait]
pub trait FeedReader: Send + Sync {
    /// The first `limit` entries of the feed, in feed order.
    async fn recent_posts(&self, url: &str, limit: usize) -> Result<Vec<BlogPost>>;
}

/// Fetches feeds over HTTP and parses them with feed-rs (RSS, Atom, JSON Feed).
pub struct HttpFeedReader {
    client: Client,
}

impl HttpFeedReader {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FeedReader for HttpFeedReader {
    async fn recent_posts(&self, url: &str, limit: usize) -> Result<Vec<BlogPost>> {
        if url.trim().is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("network error during feed fetch")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
        }

        let bytes = response.bytes().await.context("failed to read response body")?;
        parse_posts(bytes.as_ref(), limit)
    }
}

/// Parse a feed document and keep the first `limit` entries.
pub fn parse_posts(source: &[u8], limit: usize) -> Result<Vec<BlogPost>> {
    let feed = parser::parse(source).context("failed to parse feed")?;
    let now = Utc::now();
    Ok(feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| BlogPost::from_entry(entry, now))
        .collect())
}

/// Posts published strictly after `since`.
pub fn published_since(posts: Vec<BlogPost>, since: DateTime<Utc>) -> Vec<BlogPost> {
    posts.into_iter().filter(|p| p.published > since).collect()
}
