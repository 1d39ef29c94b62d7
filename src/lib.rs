//! feedreader: a terminal feed reader.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐ load_feed  ┌───────────┐  fetch()  ┌───────────┐
//! │  app.rs  │ ─────────► │ loader.rs │ ────────► │  source/  │
//! │ (state)  │  (queue)   │ (worker)  │           │ (fetcher) │
//! └──────────┘            └───────────┘           └───────────┘
//!   ▲     ▲                     │ replace()
//!   │     │  snapshot()   ┌───────────┐
//!   │     └────────────── │ render.rs │
//!   │                     │(container)│
//!   │ handle_key_event()  └───────────┘
//! ┌──────────┐   draw()   ┌───────────┐
//! │ input.rs │            │   ui.rs   │
//! └──────────┘            └───────────┘
//! ```
//!
//! * **`registry`**: the validated, ordered list of feeds.
//! * **`loader`**: the serialized asynchronous loader and its completion
//!   signal.
//! * **`render`**: turns items into entries; the shared container.
//! * **`menu`**: the feed menu's hidden/shown toggle.
//! * **`source/`**: the `FeedFetcher` transport trait and the RSS fetcher.
//! * **`config`**, **`logging`**: TOML configuration and tracing setup.
//! * **`app`**, **`ui`**, **`input`**: the terminal front-end.

pub mod app;
pub mod config;
pub mod input;
pub mod loader;
pub mod logging;
pub mod menu;
pub mod registry;
pub mod render;
pub mod source;
pub mod ui;

pub use loader::{Completion, FeedLoader, LoadError, LoaderSettings};
pub use menu::{MenuToggle, Visibility};
pub use registry::{FeedDescriptor, FeedRegistry, RegistryError};
pub use render::{Entry, FeedContainer, RenderedFeed};
