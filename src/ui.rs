//! Terminal UI rendering.
//!
//! Pure drawing: reads [`App`] state and renders one frame.  The layout is
//! a one-line header (menu icon + feed name), the entry list, and a
//! one-line status bar.  While the menu is shown, the feed list is drawn
//! over the left edge of the entry list.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::app::App;

const MENU_ICON: &str = "☰";
const MENU_WIDTH: u16 = 32;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(app, frame, header_area);
    draw_entries(app, frame, main_area);
    if !app.menu.is_hidden() {
        draw_menu(app, frame, main_area);
    }
    draw_status_bar(app, frame, status_area);
}

fn draw_header(app: &App, frame: &mut Frame, area: Rect) {
    let icon_style = if app.menu.is_hidden() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {MENU_ICON} "), icon_style),
        Span::raw(" "),
        Span::styled(
            app.title(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]));
    frame.render_widget(header, area);
}

/// Render the entries of the current feed, two lines each.
fn draw_entries(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default().title(" Entries ").borders(Borders::ALL);

    if app.entries().is_empty() {
        let message = match &app.feed {
            Some(feed) => match &feed.failure {
                Some(reason) => format!("No entries: {reason}"),
                None => "No entries".to_string(),
            },
            None if app.loading.is_some() => "Loading…".to_string(),
            None => "No feed loaded".to_string(),
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let list_items: Vec<ListItem> = app
        .entries()
        .iter()
        .map(|entry| {
            let heading = Line::from(vec![
                Span::styled(
                    format!("{:<18}", entry.date),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(" "),
                Span::styled(entry.title.clone(), Style::default().fg(Color::White)),
            ]);
            let mut lines = vec![heading];
            if !entry.snippet.is_empty() {
                lines.push(Line::styled(
                    format!("{:19}{}", "", entry.snippet),
                    Style::default().fg(Color::Gray),
                ));
            }
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(list_items)
        .block(block)
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// Overlay the feed menu on the left of `area`.
fn draw_menu(app: &mut App, frame: &mut Frame, area: Rect) {
    let area = Rect {
        width: area.width.min(MENU_WIDTH),
        ..area
    };

    let items: Vec<ListItem> = app
        .registry()
        .iter()
        .map(|feed| ListItem::new(feed.name.clone()))
        .collect();

    let menu = List::new(items)
        .block(
            Block::default()
                .title(" Feeds ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("▸ ");

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(menu, area, &mut app.menu_state);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!("{} entries", app.entries().len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  q: quit  m: menu  r: reload  ↑/↓: move  Enter: open"),
    ]));
    frame.render_widget(status, area);
}
