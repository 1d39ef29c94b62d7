//! Keyboard input handling.
//!
//! Maps terminal key events to [`App`] actions.  With the feed menu open the
//! movement keys drive the menu cursor; otherwise they scroll the entries.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::app::App;

/// Process a single key event, updating app state accordingly.
///
/// Only key presses count, so each physical keypress triggers one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    let menu_open = !app.menu.is_hidden();

    match key.code {
        KeyCode::Char('q') => app.quit = true,
        KeyCode::Esc if menu_open => app.menu.hide(),
        KeyCode::Esc => app.quit = true,
        KeyCode::Char('m') => app.toggle_menu(),
        KeyCode::Char('r') => app.reload(),
        KeyCode::Enter if menu_open => app.choose_from_menu(),
        KeyCode::Down | KeyCode::Char('j') if menu_open => app.menu_next(),
        KeyCode::Up | KeyCode::Char('k') if menu_open => app.menu_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        _ => {}
    }
}
