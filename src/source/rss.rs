//! RSS 2.0 over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::{FeedFetcher, FeedItem};
use crate::registry::FeedDescriptor;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fetches a feed with a blocking HTTP GET and parses it with the [`rss`]
/// crate.
///
/// The HTTP client is built per request on the calling (blocking-pool)
/// thread; a blocking client must not be created or dropped on an async
/// worker.
#[derive(Debug, Clone, Default)]
pub struct RssFetcher;

impl RssFetcher {
    /// Convert an already-parsed channel into items tagged with `feed_name`.
    ///
    /// Pure function, no I/O.
    pub fn parse_channel(channel: &::rss::Channel, feed_name: &str) -> Vec<FeedItem> {
        channel
            .items()
            .iter()
            .map(|item| {
                let id = item
                    .guid()
                    .map(|g| g.value().to_string())
                    .or_else(|| item.link().map(String::from))
                    .unwrap_or_default();

                // Unparseable dates degrade to undated.
                let published = item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|dt| dt.with_timezone(&Utc));

                FeedItem {
                    id,
                    title: item.title().unwrap_or("(untitled)").to_string(),
                    summary: item
                        .description()
                        .or_else(|| item.content())
                        .map(String::from),
                    link: item.link().map(String::from),
                    published,
                    feed: feed_name.to_string(),
                }
            })
            .collect()
    }
}

impl FeedFetcher for RssFetcher {
    fn fetch(&self, feed: &FeedDescriptor, timeout: Duration) -> Result<Vec<FeedItem>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let body = client
            .get(&feed.url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("GET {}", feed.url))?
            .bytes()?;

        let channel = ::rss::Channel::read_from(body.as_ref())
            .with_context(|| format!("{} is not a valid RSS document", feed.url))?;

        Ok(Self::parse_channel(&channel, &feed.name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
