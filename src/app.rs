use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ratatui::widgets::ListState;

use crate::loader::FeedLoader;
use crate::menu::{MenuToggle, Visibility};
use crate::registry::FeedRegistry;
use crate::render::{Entry, FeedContainer, RenderedFeed};

pub struct App {
    registry: Arc<FeedRegistry>,
    loader: FeedLoader,
    container: FeedContainer,
    /// Last snapshot taken from the container.
    pub feed: Option<RenderedFeed>,
    /// Container generation `feed` was taken at.
    seen_generation: u64,
    /// Feed most recently requested, while any request is still pending.
    pub loading: Option<usize>,
    /// Requests issued by [`App::open_feed`] whose completion has not fired.
    outstanding: Arc<AtomicUsize>,
    pub menu: MenuToggle,
    /// Cursor in the feed menu.
    pub menu_state: ListState,
    /// Selection in the entry list.
    pub list_state: ListState,
    pub quit: bool,
    /// Last status message.
    pub status: String,
}

impl App {
    pub fn new(loader: FeedLoader) -> Self {
        Self {
            registry: Arc::clone(loader.registry()),
            container: loader.container(),
            loader,
            feed: None,
            seen_generation: 0,
            loading: None,
            outstanding: Arc::new(AtomicUsize::new(0)),
            menu: MenuToggle::default(),
            menu_state: ListState::default(),
            list_state: ListState::default(),
            quit: false,
            status: "Starting…".into(),
        }
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub fn entries(&self) -> &[Entry] {
        self.feed
            .as_ref()
            .map(|f| f.entries.as_slice())
            .unwrap_or_default()
    }

    /// Header title: the rendered feed, or the one being loaded.
    pub fn title(&self) -> &str {
        self.feed
            .as_ref()
            .map(|f| f.name.as_str())
            .or_else(|| {
                self.loading
                    .and_then(|i| self.registry.get(i).ok())
                    .map(|f| f.name.as_str())
            })
            .unwrap_or("Feeds")
    }

    /// Pick up a newly rendered feed.  Returns `true` if anything changed.
    pub fn refresh(&mut self) -> bool {
        // A render of the same index may belong to an earlier request, so
        // only the completions tell when the last one is done.
        let settled = self.loading.is_some() && self.outstanding.load(Ordering::SeqCst) == 0;
        if settled {
            self.loading = None;
        }

        let (generation, feed) = self.container.versioned_snapshot();
        if generation == self.seen_generation {
            return settled;
        }
        self.seen_generation = generation;

        if let Some(feed) = &feed {
            self.status = match &feed.failure {
                Some(reason) => format!("{}: {reason}", feed.name),
                None => format!("{} entries from {}", feed.entries.len(), feed.name),
            };
        }

        self.feed = feed;
        let first = if self.entries().is_empty() { None } else { Some(0) };
        self.list_state.select(first);
        true
    }

    // -- feeds ---------------------------------------------------------------

    /// Request feed `index`.  The result shows up on a later [`refresh`].
    ///
    /// [`refresh`]: App::refresh
    pub fn open_feed(&mut self, index: usize) {
        let outstanding = Arc::clone(&self.outstanding);
        outstanding.fetch_add(1, Ordering::SeqCst);
        let result = self.loader.load_feed_then(index, move || {
            outstanding.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(index, "requested feed rendered");
        });

        match result {
            Ok(()) => {
                self.loading = Some(index);
                if let Ok(feed) = self.registry.get(index) {
                    self.status = format!("Loading {}…", feed.name);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "feed request rejected");
                self.status = format!("Error: {e}");
            }
        }
    }

    /// Load the feed under the menu cursor and close the menu.
    pub fn choose_from_menu(&mut self) {
        let index = self.menu_state.selected().unwrap_or(0);
        self.menu.hide();
        self.open_feed(index);
    }

    pub fn reload(&mut self) {
        let index = self.feed.as_ref().map_or(0, |f| f.index);
        self.open_feed(index);
    }

    // -- menu ----------------------------------------------------------------

    /// Flip the menu.  Opening it puts the cursor on the current feed.
    pub fn toggle_menu(&mut self) {
        if self.menu.activate() == Visibility::Shown {
            let current = self.feed.as_ref().map_or(0, |f| f.index);
            self.menu_state.select(Some(current));
        }
    }

    pub fn menu_next(&mut self) {
        let last = self.registry.len() - 1;
        let i = self.menu_state.selected().map_or(0, |i| (i + 1).min(last));
        self.menu_state.select(Some(i));
    }

    pub fn menu_previous(&mut self) {
        let i = self.menu_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.menu_state.select(Some(i));
    }

    // -- entry navigation ----------------------------------------------------

    pub fn select_next(&mut self) {
        let len = self.entries().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.entries().is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.entries().is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let len = self.entries().len();
        if len > 0 {
            self.list_state.select(Some(len - 1));
        }
    }
}
