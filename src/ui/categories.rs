use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState},
    Frame,
};

use crate::api::AVAILABLE_CATEGORIES;
use crate::app::App;
use crate::feed::FilterMode;

use super::card::category_badge;
use super::render::centered;

/// Render the category picker overlay.
pub fn render(f: &mut Frame, app: &App, cursor: usize) {
    let preferences = app.feed.preferences();
    let filter = match preferences.filter_mode {
        FilterMode::All => "Showing all categories",
        FilterMode::Selected => "Showing selected categories only",
    };

    let mut items: Vec<ListItem> = AVAILABLE_CATEGORIES
        .iter()
        .map(|category| {
            let mark = if preferences.selected_categories.contains(category) {
                "[x] "
            } else {
                "[ ] "
            };
            ListItem::new(Line::from(vec![Span::raw(mark), category_badge(category)]))
        })
        .collect();
    items.push(ListItem::new(""));
    items.push(ListItem::new(Span::styled(
        filter,
        Style::default().fg(Color::DarkGray),
    )));
    items.push(ListItem::new(Span::styled(
        "(Space) Toggle  (a) All/Selected  (Esc) Close",
        Style::default().fg(Color::DarkGray),
    )));

    // +2 for borders
    let height = u16::try_from(items.len() + 2).unwrap_or(u16::MAX);
    let Some(overlay) = centered(f.area(), 48, height) else {
        return;
    };
    f.render_widget(Clear, overlay);

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Categories "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(cursor));
    f.render_stateful_widget(list, overlay, &mut state);
}
