//! Turning fetched items into renderable entries, and the container that
//! holds the currently rendered feed.
//!
//! The loader is the only writer of a [`FeedContainer`].  Every load
//! replaces the whole [`RenderedFeed`] in one locked swap, so a reader sees
//! either the previous feed or the new one, never a mix of both.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::source::FeedItem;

/// Longest snippet shown under an entry title, in characters.
const SNIPPET_LEN: usize = 160;

/// One rendered unit of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub link: Option<String>,
    /// Plain-text excerpt of the item summary.
    pub snippet: String,
    /// `YYYY-MM-DD HH:MM`, or `"no date"`.
    pub date: String,
}

/// The content of the container after a load.
///
/// Equality is content identity: two loads of the same stable source
/// compare equal, two different feeds do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFeed {
    /// Registry index of the feed this content represents.
    pub index: usize,
    pub name: String,
    pub entries: Vec<Entry>,
    /// Set when retrieval failed and `entries` is the empty fallback.
    pub failure: Option<String>,
}

impl RenderedFeed {
    pub fn failed(index: usize, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            entries: Vec::new(),
            failure: Some(reason.into()),
        }
    }
}

/// Sort `items` newest first and render each into an [`Entry`].
pub fn render_entries(mut items: Vec<FeedItem>) -> Vec<Entry> {
    items.sort();
    items
        .into_iter()
        .map(|item| Entry {
            date: item
                .published
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "no date".into()),
            snippet: item.summary.as_deref().map(snippet).unwrap_or_default(),
            title: item.title,
            link: item.link,
        })
        .collect()
}

/// Strip markup from `html`, collapse whitespace and cut the result to
/// [`SNIPPET_LEN`] characters.
pub fn snippet(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_LEN {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(SNIPPET_LEN - 1).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    feed: Option<RenderedFeed>,
}

/// Shared handle to the rendered feed.  Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct FeedContainer {
    slot: Arc<RwLock<Slot>>,
}

impl FeedContainer {
    /// Replace the content in full and bump the generation.
    pub(crate) fn replace(&self, feed: RenderedFeed) -> u64 {
        let mut slot = self.slot.write();
        slot.generation += 1;
        slot.feed = Some(feed);
        slot.generation
    }

    /// Copy of the current content; `None` before the first load.
    pub fn snapshot(&self) -> Option<RenderedFeed> {
        self.slot.read().feed.clone()
    }

    /// Number of entries currently rendered.
    pub fn entry_count(&self) -> usize {
        self.slot.read().feed.as_ref().map_or(0, |f| f.entries.len())
    }

    /// Incremented on every replacement; `0` means nothing was rendered yet.
    pub fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    /// Generation and content read under one lock.
    pub fn versioned_snapshot(&self) -> (u64, Option<RenderedFeed>) {
        let slot = self.slot.read();
        (slot.generation, slot.feed.clone())
    }
}
