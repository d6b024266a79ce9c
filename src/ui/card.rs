use chrono::Utc;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::api::{Article, Category};
use crate::app::App;
use crate::feed::ViewMode;
use crate::util::{display_width, format_time_ago};

/// Render the focused article, shifted by the live gesture offset.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    // EDGE-001: Guard against zero-width/height areas
    if area.width < 3 || area.height < 3 {
        return;
    }

    let Some(article) = app.current_article().cloned() else {
        render_empty(f, app, area);
        app.article_max_scroll = 0;
        return;
    };

    let facts = app.store.query(&article.id);
    let lines = card_lines(
        &article,
        facts.read,
        facts.bookmarked,
        app.feed.navigator().index(),
        app.feed.view().len(),
        app.feed.view_mode(),
    );

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    app.article_max_scroll = total.saturating_sub(inner_height);
    // Content can shrink on resize; keep the scroll inside it.
    let max = app.article_max_scroll;
    app.feed.navigator_mut().clamp_scroll_rows(max);

    let navigator = app.feed.navigator();
    let row_height = navigator.config().row_height.max(1.0);
    let shift = (navigator.offset() / row_height).round() as i32;
    let Some(card_area) = shifted(area, shift) else {
        return;
    };

    // Rows cut off the top of a card moving up are scrolled past instead
    let clipped_top = if shift < 0 {
        u16::try_from(-shift).unwrap_or(u16::MAX)
    } else {
        0
    };
    let title = format!(" {} ", article.source);
    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((navigator.scroll_rows().saturating_add(clipped_top), 0));

    f.render_widget(paragraph, card_area);
}

/// The card moved `shift` rows, clipped to `area`.
fn shifted(area: Rect, shift: i32) -> Option<Rect> {
    let height = i32::from(area.height);
    if shift.abs() >= height {
        return None;
    }
    let visible = u16::try_from(height - shift.abs()).ok()?;
    let y = if shift > 0 {
        area.y.saturating_add(u16::try_from(shift).ok()?)
    } else {
        area.y
    };
    Some(Rect::new(area.x, y, area.width, visible))
}

fn card_lines(
    article: &Article,
    read: bool,
    bookmarked: bool,
    index: usize,
    count: usize,
    mode: ViewMode,
) -> Vec<Line<'static>> {
    let mut badge = vec![category_badge(&article.category)];
    if read {
        badge.push(Span::styled("  ✓ Read", Style::default().fg(Color::Green)));
    }

    let bookmark = if bookmarked {
        Span::styled("★ Bookmarked", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("☆ Bookmark [b]", Style::default().fg(Color::DarkGray))
    };

    let footer = if mode == ViewMode::BookmarksOnly && count == 1 {
        "This is your only bookmarked article".to_string()
    } else {
        format!("Article {} of {} • Swipe to navigate", index + 1, count)
    };

    vec![
        Line::from(badge),
        Line::from(""),
        Line::from(Span::styled(
            article.title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(article.summary.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{} • {}",
                article.source,
                format_time_ago(article.published_at, Utc::now())
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(bookmark),
        Line::from(""),
        Line::from(Span::styled(footer, Style::default().fg(Color::DarkGray)))
            .alignment(Alignment::Center),
    ]
}

pub(super) fn category_badge(category: &Category) -> Span<'static> {
    Span::styled(
        format!(" {} ", category.label()),
        Style::default()
            .fg(Color::White)
            .bg(Color::from_u32(category.color()))
            .add_modifier(Modifier::BOLD),
    )
}

fn render_empty(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = match app.feed.view_mode() {
        _ if app.loading && !app.loaded_once => vec![Line::from("Loading articles...")],
        ViewMode::All if !app.feed.has_articles() => vec![
            Line::from(Span::styled(
                "No articles yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Check back soon, or press r to refresh."),
        ],
        ViewMode::All => vec![
            Line::from(Span::styled(
                "No articles",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Nothing matches the current category filter. Press c to change it."),
        ],
        ViewMode::BookmarksOnly => vec![
            Line::from(Span::styled(
                "No bookmarks yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press b on an article to save it. Tab returns to all articles."),
        ],
    };
    if let Some(prompt) = app.retry_prompt {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("{} Press r to retry.", prompt),
            Style::default().fg(Color::Red),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" NineT "))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

/// Rows `lines` occupy once wrapped to `width` columns.
pub(super) fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| {
            let w: usize = line.spans.iter().map(|s| display_width(&s.content)).sum();
            w.div_ceil(width).max(1)
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}
