use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use feedreader::app::App;
use feedreader::config::Config;
use feedreader::source::RssFetcher;
use feedreader::{input, logging, ui, FeedLoader};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file [default: <config dir>/feedreader/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feed to open at startup, by index; overrides `initial_feed`
    #[arg(short, long)]
    feed: Option<usize>,

    /// Write logs to this file (also settable via FEEDREADER_LOG)
    #[arg(long)]
    log: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Terminal lifetime
// ---------------------------------------------------------------------------

/// Raw mode + alternate screen for as long as the guard lives.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the panic message is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(logging::log_path(args.log.as_deref()).as_deref())?;

    // Configuration problems, an empty feed list included, are fatal and
    // reported before the terminal is taken over.
    let config = Config::load(args.config.as_deref())?;
    let registry = Arc::new(config.registry()?);
    let initial = args.feed.unwrap_or(config.initial_feed);
    registry.get(initial)?;

    tracing::info!(feeds = registry.len(), initial, "starting");

    // The loader gets the single runtime worker; the UI loop below stays on
    // the main thread and blocks on terminal input freely.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("feed-loader")
        .enable_all()
        .build()?;
    let context = runtime.enter();

    let settings = config.loader_settings();
    let loader = FeedLoader::spawn(registry, Arc::new(RssFetcher), settings);

    install_panic_hook();
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(loader);
    app.open_feed(initial);

    // ~10 fps: pick up renders, draw, then wait up to one tick for a key.
    let tick_rate = Duration::from_millis(100);

    loop {
        app.refresh();

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.quit {
            break;
        }
    }

    tracing::info!("exiting");

    // Restore the terminal first; a fetch still blocking in the pool must
    // not hold up the exit.
    drop(guard);
    drop(app);
    drop(context);
    runtime.shutdown_background();
    Ok(())
}
