//! Asynchronous feed loading.
//!
//! A [`FeedLoader`] owns one worker task and an in-order request queue.
//! Every request goes through the same cycle, one at a time:
//!
//! ```text
//!  load_feed(i) ──► queue ──► worker: fetch (blocking pool, bounded by
//!                                     the fetch timeout)
//!                                   ─► render, replace container
//!                                   ─► fire completion
//! ```
//!
//! Because the worker never starts request *n + 1* before request *n* has
//! replaced the container and fired its completion, a load issued from
//! inside a completion callback always renders after the one that called
//! it, and loads issued back to back are rendered in call order.
//!
//! A retrieval that outlives the fetch timeout completes its request right
//! away with an empty render, but the worker still waits for the fetch to
//! return before starting the next one, so at most one retrieval is ever in
//! flight.  The timeout is also handed to the fetcher, which is expected to
//! give up on its own around then.
//!
//! Retrieval problems never escape the worker.  A failed, timed-out or
//! empty fetch replaces the container with an empty render of the requested
//! feed (carrying a failure note) and still fires the completion, so nobody
//! waiting on it can hang.  Only an unknown index is an error, and it is
//! reported synchronously to the caller.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::registry::{FeedDescriptor, FeedRegistry, RegistryError};
use crate::render::{render_entries, FeedContainer, RenderedFeed};
use crate::source::{FeedFetcher, FeedItem};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("unknown feed {index}")]
    UnknownFeed {
        index: usize,
        #[source]
        source: RegistryError,
    },
}

#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Upper bound for one retrieval, after which the load completes with
    /// an empty render.
    pub fetch_timeout: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(20),
        }
    }
}

/// How a request reports that it is done.
enum Signal {
    Channel(oneshot::Sender<()>),
    Callback(Box<dyn FnOnce() + Send>),
}

impl Signal {
    fn fire(self) {
        match self {
            // The receiver may have been dropped; nobody is waiting then.
            Signal::Channel(tx) => {
                let _ = tx.send(());
            }
            // A panicking callback must not take the worker down with it.
            Signal::Callback(on_complete) => {
                if panic::catch_unwind(AssertUnwindSafe(on_complete)).is_err() {
                    tracing::error!("completion callback panicked");
                }
            }
        }
    }
}

/// Fires its signal exactly once: explicitly through [`Notify::fire`], or
/// on drop if the request never got that far (worker gone, queue dropped,
/// worker unwinding).
struct Notify(Option<Signal>);

impl Notify {
    fn channel(tx: oneshot::Sender<()>) -> Self {
        Notify(Some(Signal::Channel(tx)))
    }

    fn callback(on_complete: Box<dyn FnOnce() + Send>) -> Self {
        Notify(Some(Signal::Callback(on_complete)))
    }

    fn fire(mut self) {
        if let Some(signal) = self.0.take() {
            signal.fire();
        }
    }
}

impl Drop for Notify {
    fn drop(&mut self) {
        if let Some(signal) = self.0.take() {
            tracing::debug!("load request dropped before completion; signalling anyway");
            signal.fire();
        }
    }
}

struct LoadRequest {
    index: usize,
    feed: FeedDescriptor,
    notify: Notify,
}

/// Resolves once the requested feed is rendered into the container.
///
/// Resolves exactly once, also when the load failed or the loader was shut
/// down before reaching the request.
#[must_use = "a Completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<()>,
}

impl Future for Completion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // A closed channel means the worker is gone; that counts as done.
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

/// Handle to the loader worker.  Clones share the worker and the container.
#[derive(Clone)]
pub struct FeedLoader {
    registry: Arc<FeedRegistry>,
    queue: mpsc::UnboundedSender<LoadRequest>,
    container: FeedContainer,
}

impl FeedLoader {
    /// Start the worker on the current tokio runtime.
    ///
    /// The worker stops once every handle has been dropped.
    pub fn spawn(
        registry: Arc<FeedRegistry>,
        fetcher: Arc<dyn FeedFetcher>,
        settings: LoaderSettings,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let container = FeedContainer::default();

        tokio::spawn(run(rx, fetcher, container.clone(), settings));

        Self {
            registry,
            queue,
            container,
        }
    }

    /// Queue a load of feed `index`.
    ///
    /// Fails immediately with [`LoadError::UnknownFeed`] when `index` is not
    /// in the registry.
    pub fn load_feed(&self, index: usize) -> Result<Completion, LoadError> {
        let feed = self.resolve(index)?;
        let (tx, rx) = oneshot::channel();
        self.enqueue(LoadRequest {
            index,
            feed,
            notify: Notify::channel(tx),
        });
        Ok(Completion { rx })
    }

    /// Queue a load of feed `index` and call `on_complete` once it is
    /// rendered.
    ///
    /// `on_complete` runs exactly once per call.  For an unknown index it
    /// runs right away, before the error is returned.  Otherwise it runs on
    /// the worker, which makes it safe to queue the next load from inside
    /// it.
    pub fn load_feed_then<F>(&self, index: usize, on_complete: F) -> Result<(), LoadError>
    where
        F: FnOnce() + Send + 'static,
    {
        let feed = match self.resolve(index) {
            Ok(feed) => feed,
            Err(e) => {
                on_complete();
                return Err(e);
            }
        };
        self.enqueue(LoadRequest {
            index,
            feed,
            notify: Notify::callback(Box::new(on_complete)),
        });
        Ok(())
    }

    /// The container this loader renders into.
    pub fn container(&self) -> FeedContainer {
        self.container.clone()
    }

    pub fn registry(&self) -> &Arc<FeedRegistry> {
        &self.registry
    }

    fn resolve(&self, index: usize) -> Result<FeedDescriptor, LoadError> {
        self.registry
            .get(index)
            .cloned()
            .map_err(|source| LoadError::UnknownFeed { index, source })
    }

    fn enqueue(&self, request: LoadRequest) {
        if let Err(mpsc::error::SendError(request)) = self.queue.send(request) {
            tracing::warn!(index = request.index, "loader worker is gone; completing without a load");
            request.notify.fire();
        }
    }
}

/// The worker loop: one request at a time, in queue order.
async fn run(
    mut queue: mpsc::UnboundedReceiver<LoadRequest>,
    fetcher: Arc<dyn FeedFetcher>,
    container: FeedContainer,
    settings: LoaderSettings,
) {
    tracing::debug!("feed loader started");

    while let Some(LoadRequest {
        index,
        feed,
        notify,
    }) = queue.recv().await
    {
        tracing::debug!(index, feed = %feed.name, "loading feed");

        let (rendered, straggler) = retrieve(&fetcher, index, feed, settings.fetch_timeout).await;
        let entries = rendered.entries.len();
        let generation = container.replace(rendered);

        tracing::debug!(index, entries, generation, "feed rendered");
        notify.fire();

        // The caller has its answer, but the timed-out fetch still occupies
        // the transport.  Let it finish before the next retrieval starts.
        if let Some(task) = straggler {
            tracing::debug!(index, "waiting for timed-out retrieval to return");
            let _ = task.await;
        }
    }

    tracing::debug!("feed loader stopped");
}

type FetchTask = JoinHandle<anyhow::Result<Vec<FeedItem>>>;

/// Fetch `feed` and render it, folding every failure into an empty render.
///
/// On timeout the still-running fetch task is handed back so the worker can
/// wait for it.
async fn retrieve(
    fetcher: &Arc<dyn FeedFetcher>,
    index: usize,
    feed: FeedDescriptor,
    timeout: Duration,
) -> (RenderedFeed, Option<FetchTask>) {
    let name = feed.name.clone();
    let fetcher = Arc::clone(fetcher);
    let mut task: FetchTask = tokio::task::spawn_blocking(move || fetcher.fetch(&feed, timeout));

    let rendered = match tokio::time::timeout(timeout, &mut task).await {
        Err(_) => {
            tracing::warn!(index, feed = %name, ?timeout, "feed retrieval timed out");
            let rendered = RenderedFeed::failed(
                index,
                name,
                format!("timed out after {}s", timeout.as_secs_f32()),
            );
            return (rendered, Some(task));
        }
        Ok(Err(join_error)) => {
            tracing::warn!(index, feed = %name, error = %join_error, "feed retrieval task failed");
            RenderedFeed::failed(index, name, "retrieval task failed")
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(index, feed = %name, error = ?e, "feed retrieval failed");
            RenderedFeed::failed(index, name, format!("{e:#}"))
        }
        Ok(Ok(Ok(items))) if items.is_empty() => {
            tracing::error!(index, feed = %name, "feed retrieved but produced no entries");
            RenderedFeed::failed(index, name, "feed has no entries")
        }
        Ok(Ok(Ok(items))) => RenderedFeed {
            index,
            name,
            entries: render_entries(items),
            failure: None,
        },
    };
    (rendered, None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;

    fn item(feed: &str, n: usize) -> FeedItem {
        FeedItem {
            id: format!("{feed}-{n}"),
            title: format!("{feed} post {n}"),
            summary: Some(format!("<p>Body of {feed} post {n}</p>")),
            link: None,
            published: None,
            feed: feed.to_string(),
        }
    }

    /// Serves fixed items per url, records the fetch order and the largest
    /// number of fetches that ever ran at the same time.
    #[derive(Default)]
    struct FakeFetcher {
        items: HashMap<String, Vec<FeedItem>>,
        delay: Duration,
        fetched: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeFetcher {
        fn serving(feeds: &[(&str, usize)]) -> Self {
            let items = feeds
                .iter()
                .map(|(url, count)| (url.to_string(), (0..*count).map(|n| item(url, n)).collect()))
                .collect();
            Self {
                items,
                ..Self::default()
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl FeedFetcher for FakeFetcher {
        fn fetch(&self, feed: &FeedDescriptor, _timeout: Duration) -> Result<Vec<FeedItem>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.fetched.lock().push(feed.url.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.items
                .get(&feed.url)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused: {}", feed.url))
        }
    }

    fn registry() -> Arc<FeedRegistry> {
        Arc::new(
            FeedRegistry::new(vec![
                FeedDescriptor::new("A", "u1"),
                FeedDescriptor::new("B", "u2"),
            ])
            .unwrap(),
        )
    }

    fn spawn_with(fetcher: Arc<dyn FeedFetcher>) -> FeedLoader {
        FeedLoader::spawn(registry(), fetcher, LoaderSettings::default())
    }

    // -- successful loads ----------------------------------------------------

    #[tokio::test]
    async fn every_valid_index_renders_entries() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 3), ("u2", 2)])));
        let container = loader.container();

        for index in 0..loader.registry().len() {
            loader.load_feed(index).unwrap().await;
            assert!(container.entry_count() > 0);
            assert_eq!(container.snapshot().unwrap().index, index);
        }
    }

    #[tokio::test]
    async fn callback_fires_exactly_once() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 1), ("u2", 1)])));
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = Arc::clone(&calls);
        loader
            .load_feed_then(0, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();
        rx.await.unwrap();

        // A later load must not re-fire the earlier callback.
        loader.load_feed(1).unwrap().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nested_load_replaces_content() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 2), ("u2", 2)])));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let inner = loader.clone();
        loader
            .load_feed_then(0, move || {
                let container = inner.container();
                tx.send(container.snapshot()).unwrap();
                inner
                    .load_feed_then(1, move || {
                        tx.send(container.snapshot()).unwrap();
                    })
                    .unwrap();
            })
            .unwrap();

        let old_feed = rx.recv().await.unwrap().unwrap();
        let new_feed = rx.recv().await.unwrap().unwrap();

        assert_eq!(old_feed.index, 0);
        assert_eq!(new_feed.index, 1);
        assert_ne!(old_feed, new_feed);
        assert!(new_feed.entries.iter().all(|e| e.title.starts_with("u2")));
    }

    #[tokio::test]
    async fn same_feed_twice_renders_the_same() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 4)])));
        let container = loader.container();

        loader.load_feed(0).unwrap().await;
        let first = container.snapshot();
        loader.load_feed(0).unwrap().await;
        let second = container.snapshot();

        assert_eq!(first, second);
        assert_eq!(container.generation(), 2);
    }

    // -- unknown index -------------------------------------------------------

    #[tokio::test]
    async fn unknown_index_is_reported_synchronously() {
        let loader = spawn_with(Arc::new(FakeFetcher::default()));

        let err = loader.load_feed(7).unwrap_err();
        assert_eq!(
            err,
            LoadError::UnknownFeed {
                index: 7,
                source: RegistryError::OutOfRange { index: 7, len: 2 },
            }
        );
        assert_eq!(loader.container().generation(), 0, "nothing was rendered");
    }

    #[tokio::test]
    async fn callback_fires_for_unknown_index() {
        let loader = spawn_with(Arc::new(FakeFetcher::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let result = loader.load_feed_then(2, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(result, Err(LoadError::UnknownFeed { index: 2, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // -- absorbed failures ---------------------------------------------------

    #[tokio::test]
    async fn failed_retrieval_still_completes_with_empty_render() {
        // Only u1 is served; u2 fails.
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 2)])));
        let container = loader.container();

        loader.load_feed(0).unwrap().await;
        assert_eq!(container.entry_count(), 2);

        loader.load_feed(1).unwrap().await;
        let snapshot = container.snapshot().unwrap();
        assert_eq!(snapshot.index, 1);
        assert!(snapshot.entries.is_empty(), "feed A must not linger");
        assert!(snapshot.failure.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_feed_is_reported_as_failure() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 0)])));
        let container = loader.container();

        loader.load_feed(0).unwrap().await;
        let snapshot = container.snapshot().unwrap();
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.failure.as_deref(), Some("feed has no entries"));
    }

    #[tokio::test]
    async fn slow_retrieval_times_out_and_completes() {
        let fetcher = FakeFetcher::serving(&[("u1", 1)]).with_delay(Duration::from_millis(300));
        let loader = FeedLoader::spawn(
            registry(),
            Arc::new(fetcher),
            LoaderSettings {
                fetch_timeout: Duration::from_millis(20),
            },
        );

        loader.load_feed(0).unwrap().await;
        let snapshot = loader.container().snapshot().unwrap();
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.failure.unwrap().starts_with("timed out"));
    }

    // -- ordering ------------------------------------------------------------

    #[tokio::test]
    async fn back_to_back_loads_are_serialized_in_call_order() {
        let fetcher = Arc::new(
            FakeFetcher::serving(&[("u1", 1), ("u2", 1)]).with_delay(Duration::from_millis(10)),
        );
        let loader = spawn_with(fetcher.clone());

        let first = loader.load_feed(0).unwrap();
        let second = loader.load_feed(1).unwrap();
        let third = loader.load_feed(0).unwrap();

        // Await out of order; the worker still runs them in queue order.
        third.await;
        second.await;
        first.await;

        assert_eq!(*fetcher.fetched.lock(), ["u1", "u2", "u1"]);
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);

        let container = loader.container();
        assert_eq!(container.generation(), 3);
        assert_eq!(container.snapshot().unwrap().index, 0);
    }

    #[tokio::test]
    async fn dropped_completion_does_not_stall_the_queue() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 1), ("u2", 1)])));

        drop(loader.load_feed(0).unwrap());
        loader.load_feed(1).unwrap().await;

        assert_eq!(loader.container().snapshot().unwrap().index, 1);
    }

    #[tokio::test]
    async fn timed_out_retrieval_is_not_overlapped_by_the_next() {
        let fetcher = Arc::new(
            FakeFetcher::serving(&[("u1", 1), ("u2", 1)]).with_delay(Duration::from_millis(150)),
        );
        let loader = FeedLoader::spawn(
            registry(),
            fetcher.clone(),
            LoaderSettings {
                fetch_timeout: Duration::from_millis(20),
            },
        );

        loader.load_feed(0).unwrap().await;
        loader.load_feed(1).unwrap().await;
        // Barrier: u2's own straggler has returned once this completes.
        loader.load_feed(0).unwrap().await;

        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.fetched.lock()[..2], ["u1", "u2"]);
    }

    // -- callback form under failure -----------------------------------------

    async fn count_callback(loader: &FeedLoader, index: usize) -> usize {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = Arc::clone(&calls);
        loader
            .load_feed_then(index, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();
        rx.await.unwrap();

        // Anything queued later has certainly run past this request.
        loader.load_feed(index).unwrap().await;
        calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn callback_fires_once_when_retrieval_fails() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 1)])));

        assert_eq!(count_callback(&loader, 1).await, 1);
        let snapshot = loader.container().snapshot().unwrap();
        assert_eq!(snapshot.index, 1);
        assert!(snapshot.entries.is_empty());
    }

    #[tokio::test]
    async fn callback_fires_once_when_retrieval_times_out() {
        let fetcher = FakeFetcher::serving(&[("u1", 1)]).with_delay(Duration::from_millis(100));
        let loader = FeedLoader::spawn(
            registry(),
            Arc::new(fetcher),
            LoaderSettings {
                fetch_timeout: Duration::from_millis(10),
            },
        );

        assert_eq!(count_callback(&loader, 0).await, 1);
        let failure = loader.container().snapshot().unwrap().failure.unwrap();
        assert!(failure.starts_with("timed out"));
    }

    // -- callback robustness -------------------------------------------------

    #[tokio::test]
    async fn panicking_callback_does_not_stop_the_loader() {
        let loader = spawn_with(Arc::new(FakeFetcher::serving(&[("u1", 1), ("u2", 1)])));
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        loader
            .load_feed_then(0, || panic!("callback failure"))
            .unwrap();
        let counter = Arc::clone(&calls);
        loader
            .load_feed_then(1, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();

        rx.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        loader.load_feed(1).unwrap().await;
        assert_eq!(loader.container().snapshot().unwrap().index, 1);
    }

    #[test]
    fn dropped_request_still_signals_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let request = LoadRequest {
            index: 0,
            feed: FeedDescriptor::new("A", "u1"),
            notify: Notify::callback(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        };

        drop(request);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fired_notify_does_not_fire_again_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let notify = Notify::callback(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        notify.fire();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queued_callbacks_run_when_the_queue_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (queue, rx) = mpsc::unbounded_channel();

        for index in 0..2 {
            let counter = Arc::clone(&calls);
            let request = LoadRequest {
                index,
                feed: FeedDescriptor::new("A", "u1"),
                notify: Notify::callback(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            };
            assert!(queue.send(request).is_ok());
        }

        // The worker went away before reaching either request.
        drop(rx);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
