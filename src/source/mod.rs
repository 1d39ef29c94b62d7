//! Feed retrieval.
//!
//! The loader never talks to the network itself.  It hands a
//! [`FeedDescriptor`] to a [`FeedFetcher`] and gets back normalised
//! [`FeedItem`]s, so the transport and the feed format can be swapped
//! without touching the loading or rendering logic.
//!
//! The only shipped transport is [`RssFetcher`] (blocking HTTP GET + RSS
//! 2.0).  Tests use in-memory fetchers.

mod feed_item;
mod rss;

pub use self::feed_item::FeedItem;
pub use self::rss::RssFetcher;

use std::time::Duration;

use anyhow::Result;

use crate::registry::FeedDescriptor;

/// A transport that turns a feed descriptor into items.
///
/// [`fetch()`](FeedFetcher::fetch) is called from tokio's blocking pool, so
/// implementations may block on I/O but must be [`Send`] + [`Sync`].
pub trait FeedFetcher: Send + Sync {
    /// Retrieve the current items of `feed`, giving up after `timeout`.
    ///
    /// Any error is treated by the loader as a soft failure: it is logged
    /// and the feed renders with no entries.  The loader does not start
    /// another fetch until this one returns, so an implementation that
    /// ignores `timeout` stalls the queue behind it.
    fn fetch(&self, feed: &FeedDescriptor, timeout: Duration) -> Result<Vec<FeedItem>>;
}
