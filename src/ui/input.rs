//! Input handling for the TUI.
//!
//! Keys are dispatched by overlay first, then by screen. Mouse drags on the
//! feed screen are converted into gesture samples for the navigator.

use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use tokio::sync::mpsc;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::AVAILABLE_CATEGORIES;
use crate::app::{App, AppEvent, Overlay, Screen};

use super::Action;

/// Rows moved by one wheel notch.
const WHEEL_ROWS: i32 = 3;
/// Rows moved by PageDown/PageUp in the weekly detail page.
const PAGE_ROWS: u16 = 20;
/// A release this long after the last vertical movement carries no velocity.
const RELEASE_VELOCITY_WINDOW: Duration = Duration::from_millis(80);

/// Main input dispatch function.
pub(super) fn handle_key(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match app.overlay.clone() {
        Some(Overlay::Categories { cursor }) => return handle_categories_key(app, code, cursor),
        Some(Overlay::Share { .. }) => {
            if matches!(
                code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('s')
            ) {
                app.overlay = None;
            }
            return Action::Continue;
        }
        None => {}
    }

    match app.screen {
        Screen::Feed => handle_feed_key(app, code, event_tx),
        Screen::WeeklyList => handle_weekly_list_key(app, code, event_tx),
        Screen::WeeklyDetail => handle_weekly_detail_key(app, code),
    }
}

fn handle_feed_key(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('n') | KeyCode::Char(' ') | KeyCode::PageDown => app.next_article(),
        KeyCode::Char('p') | KeyCode::PageUp => app.previous_article(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_article(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_article(-1),
        KeyCode::Char('b') => app.toggle_bookmark_current(),
        KeyCode::Char('o') | KeyCode::Enter => app.open_current(),
        KeyCode::Char('s') => app.share_current(),
        KeyCode::Tab | KeyCode::Char('v') => app.toggle_view_mode(),
        KeyCode::Char('c') => {
            app.overlay = Some(Overlay::Categories { cursor: 0 });
        }
        KeyCode::Char('w') => {
            app.screen = Screen::WeeklyList;
            if !app.weekly.loaded && !app.weekly.loading {
                app.request_weekly(event_tx);
            }
        }
        KeyCode::Char('r') => {
            app.set_status("Refreshing...");
            app.request_articles(event_tx);
        }
        _ => {}
    }
    Action::Continue
}

fn handle_categories_key(app: &mut App, code: KeyCode, cursor: usize) -> Action {
    let last = AVAILABLE_CATEGORIES.len().saturating_sub(1);
    match code {
        KeyCode::Char('j') | KeyCode::Down => {
            app.overlay = Some(Overlay::Categories {
                cursor: (cursor + 1).min(last),
            });
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.overlay = Some(Overlay::Categories {
                cursor: cursor.saturating_sub(1),
            });
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            if let Some(category) = AVAILABLE_CATEGORIES.get(cursor) {
                app.update_preferences(|p| p.toggle_category(category));
            }
        }
        KeyCode::Char('a') => app.update_preferences(|p| p.toggle_filter_mode()),
        KeyCode::Esc | KeyCode::Char('c') | KeyCode::Char('q') => app.overlay = None,
        _ => {}
    }
    Action::Continue
}

fn handle_weekly_list_key(
    app: &mut App,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('j') | KeyCode::Down => app.weekly.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.weekly.select_previous(),
        KeyCode::Enter => {
            if app.weekly.selected_article().is_some() {
                app.weekly.scroll = 0;
                app.screen = Screen::WeeklyDetail;
            }
        }
        KeyCode::Char('r') => app.request_weekly(event_tx),
        KeyCode::Esc | KeyCode::Char('w') => app.screen = Screen::Feed,
        _ => {}
    }
    Action::Continue
}

fn handle_weekly_detail_key(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('j') | KeyCode::Down => {
            app.weekly.scroll = app.weekly.scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.weekly.scroll = app.weekly.scroll.saturating_sub(1);
        }
        KeyCode::PageDown | KeyCode::Char(' ') => {
            app.weekly.scroll = app.weekly.scroll.saturating_add(PAGE_ROWS);
        }
        KeyCode::PageUp => app.weekly.scroll = app.weekly.scroll.saturating_sub(PAGE_ROWS),
        KeyCode::Esc | KeyCode::Backspace => app.screen = Screen::WeeklyList,
        _ => {}
    }
    Action::Continue
}

// ============================================================================
// Mouse gestures
// ============================================================================

/// Tracks one left-button drag across mouse events.
#[derive(Debug, Default)]
pub(super) struct DragTracker {
    active: Option<DragSample>,
}

#[derive(Debug, Clone, Copy)]
struct DragSample {
    start_row: u16,
    last_row: u16,
    last_at: Instant,
    vy: f64,
}

impl DragSample {
    /// Fold in the pointer row at `now` and return the displacement since the
    /// drag began. Samples without vertical movement leave the velocity and
    /// its timestamp untouched.
    fn advance(&mut self, row: u16, now: Instant, row_height: f64) -> f64 {
        let dy = (f64::from(row) - f64::from(self.start_row)) * row_height;
        let step = (f64::from(row) - f64::from(self.last_row)) * row_height;
        let elapsed_ms = now.saturating_duration_since(self.last_at).as_secs_f64() * 1000.0;
        // Several samples can share one instant; keep the last velocity.
        if step != 0.0 && elapsed_ms > 0.0 {
            self.vy = step / elapsed_ms;
            self.last_row = row;
            self.last_at = now;
        }
        dy
    }
}

impl DragTracker {
    #[cfg(test)]
    pub(super) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Abandon a drag without a release (focus lost, overlay opened).
    pub(super) fn cancel(&mut self, app: &mut App) {
        if self.active.take().is_some() {
            app.feed.navigator_mut().cancel();
        }
    }
}

/// Feed a mouse event into the navigator. Only the feed screen reacts.
pub(super) fn handle_mouse(app: &mut App, tracker: &mut DragTracker, event: MouseEvent, now: Instant) {
    if app.screen != Screen::Feed || app.overlay.is_some() {
        tracker.cancel(app);
        return;
    }
    let row_height = app.feed.navigator().config().row_height;

    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if app.feed.navigator_mut().begin() {
                tracker.active = Some(DragSample {
                    start_row: event.row,
                    last_row: event.row,
                    last_at: now,
                    vy: 0.0,
                });
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            let Some(sample) = tracker.active.as_mut() else {
                return;
            };
            let dy = sample.advance(event.row, now, row_height);
            app.feed.navigator_mut().update(dy, sample.vy);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if let Some(mut sample) = tracker.active.take() {
                let held = now.saturating_duration_since(sample.last_at);
                let dy = sample.advance(event.row, now, row_height);
                if held > RELEASE_VELOCITY_WINDOW {
                    sample.vy = 0.0;
                }
                let navigator = app.feed.navigator_mut();
                navigator.update(dy, sample.vy);
                let release = navigator.release();
                tracing::trace!(?release, "Drag released");
            }
        }
        MouseEventKind::ScrollDown => app.scroll_article(WHEEL_ROWS),
        MouseEventKind::ScrollUp => app.scroll_article(-WHEEL_ROWS),
        _ => return,
    }
    app.needs_redraw = true;
}
