use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

use super::card::wrapped_height;

/// Render the weekly breakdown list.
pub fn render_list(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Weekly Breakdown ");

    if app.weekly.articles.is_empty() {
        let text = if app.weekly.loading {
            "Loading weekly articles...".to_string()
        } else if let Some(error) = app.weekly.error {
            format!("{} Press r to retry.", error)
        } else {
            "No weekly articles yet.".to_string()
        };
        f.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .weekly
        .articles
        .iter()
        .enumerate()
        .map(|(i, article)| {
            let style = if i == app.weekly.selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(Span::styled(
                    article.title.to_string(),
                    style.add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!(
                        "  {} • Week {}, {} • {} min read",
                        article.author_name,
                        article.week_number,
                        article.year,
                        article.reading_time_minutes
                    ),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let mut state = ListState::default().with_selected(Some(app.weekly.selected));
    f.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

/// Render one weekly article with its markdown body.
pub fn render_detail(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let Some(article) = app.weekly.selected_article().cloned() else {
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            article.title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "By {} • {} • Week {}, {} • {} min read",
                article.author_name,
                article.topic_category,
                article.week_number,
                article.year,
                article.reading_time_minutes
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];
    lines.extend(render_markdown(&article.content));
    if !article.tags.is_empty() {
        lines.push(Line::from(Span::styled(
            article
                .tags
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" "),
            Style::default().fg(Color::Blue),
        )));
    }

    // Clamp before rendering so a resize never shows a blank page
    let max = wrapped_height(&lines, area.width.saturating_sub(2))
        .saturating_sub(area.height.saturating_sub(2));
    app.weekly.scroll = app.weekly.scroll.min(max);

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" Weekly "))
        .wrap(Wrap { trim: false })
        .scroll((app.weekly.scroll, 0));
    f.render_widget(paragraph, area);
}

/// Convert markdown to styled ratatui Lines.
pub fn render_markdown(md: &str) -> Vec<Line<'static>> {
    let parser = Parser::new(md);
    let mut lines: Vec<Line<'static>> = Vec::with_capacity(md.lines().count());
    let mut current_spans: Vec<Span<'static>> = Vec::with_capacity(4);
    let mut in_code_block = false;
    let mut in_heading = false;
    let mut in_emphasis = false;
    let mut in_strong = false;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
                lines.push(Line::from(""));
                in_heading = false;
            }
            Event::End(TagEnd::Paragraph) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
                lines.push(Line::from(""));
            }
            Event::Start(Tag::Item) => current_spans.push(Span::raw("• ")),
            Event::End(TagEnd::Item) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
            }
            Event::End(TagEnd::List(_)) => lines.push(Line::from("")),
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                lines.push(Line::from(""));
            }
            Event::Start(Tag::Emphasis) => in_emphasis = true,
            Event::End(TagEnd::Emphasis) => in_emphasis = false,
            Event::Start(Tag::Strong) => in_strong = true,
            Event::End(TagEnd::Strong) => in_strong = false,
            Event::Start(Tag::Image { dest_url, .. }) => {
                current_spans.push(Span::styled(
                    format!("[Image: {}]", dest_url),
                    Style::default().fg(Color::Blue),
                ));
            }
            Event::Text(text) => {
                let style = if in_code_block {
                    Style::default().fg(Color::Yellow).bg(Color::Black)
                } else if in_heading {
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .fg(Color::Cyan)
                } else if in_strong {
                    Style::default().add_modifier(Modifier::BOLD)
                } else if in_emphasis {
                    Style::default().add_modifier(Modifier::ITALIC)
                } else {
                    Style::default()
                };
                if in_code_block {
                    // Code block text carries its own newlines
                    for code_line in text.lines() {
                        lines.push(Line::from(Span::styled(code_line.to_string(), style)));
                    }
                } else {
                    current_spans.push(Span::styled(text.into_string(), style));
                }
            }
            Event::Code(code) => {
                current_spans.push(Span::styled(
                    format!("`{}`", code),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Event::SoftBreak => current_spans.push(Span::raw(" ")),
            Event::HardBreak => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
            }
            _ => {}
        }
    }

    if !current_spans.is_empty() {
        lines.push(Line::from(current_spans));
    }

    lines
}
