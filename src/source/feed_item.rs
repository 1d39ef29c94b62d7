//! The normalised item type every fetcher produces.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A single item of a feed, independent of the feed format it came from.
///
/// `FeedItem` orders **newest first**.  Items without a date sort after all
/// dated ones; ties fall back to title, id and then the remaining fields, so
/// the order agrees with `==` and a given fetch always renders the same way.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedItem {
    /// Stable identifier (RSS `<guid>`, falling back to the link).
    pub id: String,

    pub title: String,

    /// Summary or description.  May contain HTML; the renderer strips it.
    pub summary: Option<String>,

    pub link: Option<String>,

    pub published: Option<DateTime<Utc>>,

    /// Name of the registry feed this item was fetched for.
    pub feed: String,
}

impl Ord for FeedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // `None < Some(_)`, so comparing `other` against `self` both puts
        // newer dates first and sinks undated items.
        other
            .published
            .cmp(&self.published)
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.link.cmp(&other.link))
            .then_with(|| self.summary.cmp(&other.summary))
            .then_with(|| self.feed.cmp(&other.feed))
    }
}

impl PartialOrd for FeedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
