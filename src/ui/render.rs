//! Render functions for the TUI.
//!
//! Dispatches on the current screen, then draws any overlay on top.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Overlay, Screen};

use super::{card, categories, status, weekly};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // EDGE-001: Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    match app.screen {
        Screen::Feed => card::render(f, app, chunks[0]),
        Screen::WeeklyList => weekly::render_list(f, app, chunks[0]),
        Screen::WeeklyDetail => weekly::render_detail(f, app, chunks[0]),
    }
    status::render(f, app, chunks[1]);

    match &app.overlay {
        Some(Overlay::Categories { cursor }) => categories::render(f, app, *cursor),
        Some(Overlay::Share { message }) => render_share_overlay(f, message),
        None => {}
    }
}

/// A `width` x `height` rect centred in `area`, or None if it cannot fit.
pub(super) fn centered(area: Rect, width: u16, height: u16) -> Option<Rect> {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    if width < 20 || height < 5 {
        return None;
    }
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Some(Rect::new(x, y, width, height))
}

/// Preview of a prepared share message.
fn render_share_overlay(f: &mut Frame, message: &str) {
    let Some(overlay) = centered(f.area(), 64, 18) else {
        return;
    };
    f.render_widget(Clear, overlay);

    let text = format!("{}\n\n(Esc) Close", message);
    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(" Share "))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, overlay);
}
