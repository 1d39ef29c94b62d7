//! The feed registry.
//!
//! An ordered, validated list of [`FeedDescriptor`]s.  The position of a
//! descriptor is its selection key: the loader, the feed menu and the
//! `--feed` flag all refer to feeds by index.
//!
//! A registry is built once at startup and never mutated afterwards, so it
//! is shared read-only (behind an `Arc`) between the loader and the UI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building or reading a [`FeedRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no feeds are registered")]
    EmptyRegistry,

    #[error("feed #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("feed index {index} is out of range (registry holds {len} feeds)")]
    OutOfRange { index: usize, len: usize },
}

/// A named feed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    /// Display name, shown in the header and the feed menu.
    pub name: String,
    /// Source URL handed to the fetcher.
    pub url: String,
}

impl FeedDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Ordered, non-empty collection of feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRegistry {
    feeds: Vec<FeedDescriptor>,
}

impl FeedRegistry {
    /// Validate `feeds` and build a registry.
    ///
    /// Fails with [`RegistryError::EmptyRegistry`] when `feeds` is empty and
    /// with [`RegistryError::EmptyField`] for the first descriptor whose name
    /// or url is blank.
    pub fn new(feeds: Vec<FeedDescriptor>) -> Result<Self, RegistryError> {
        if feeds.is_empty() {
            return Err(RegistryError::EmptyRegistry);
        }

        for (index, feed) in feeds.iter().enumerate() {
            if feed.name.trim().is_empty() {
                return Err(RegistryError::EmptyField {
                    index,
                    field: "name",
                });
            }
            if feed.url.trim().is_empty() {
                return Err(RegistryError::EmptyField { index, field: "url" });
            }
        }

        Ok(Self { feeds })
    }

    /// The descriptor at `index`.
    pub fn get(&self, index: usize) -> Result<&FeedDescriptor, RegistryError> {
        self.feeds.get(index).ok_or(RegistryError::OutOfRange {
            index,
            len: self.feeds.len(),
        })
    }

    /// Number of feeds; always at least one.
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedDescriptor> {
        self.feeds.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
