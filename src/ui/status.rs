use std::borrow::Cow;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, Screen};
use crate::util::truncate_to_width;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // EDGE-001: Guard against zero-width/height areas
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text = status_text(app);
    let text = truncate_to_width(&text, usize::from(area.width));

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text.into_owned()).style(style), area);
}

fn status_text(app: &App) -> Cow<'_, str> {
    if let Some((msg, _)) = &app.status_message {
        return Cow::Borrowed(msg.as_ref());
    }

    match app.screen {
        Screen::Feed => {
            if let Some(prompt) = app.retry_prompt {
                return Cow::Owned(format!("{} [r]etry", prompt));
            }
            if app.loading {
                return Cow::Borrowed("Loading articles...");
            }
            let state = app.store.state();
            let today = App::today();
            let mut text = format!(
                "{} | Read today {} • {:.1} min • Streak {}d",
                app.feed.view_mode().label(),
                state.articles_read_today(today),
                state.reading_time_minutes(),
                state.streak_days(today),
            );
            if let Some(session) = &app.session {
                let name = app
                    .profile
                    .as_ref()
                    .and_then(|p| p.full_name.as_deref())
                    .unwrap_or_else(|| session.user().display_name());
                text.push_str(&format!(" • {}", name));
            }
            text.push_str(
                " | [n/p]age [b]ookmark [o]pen [s]hare [Tab]view [c]ategories [w]eekly [q]uit",
            );
            Cow::Owned(text)
        }
        Screen::WeeklyList => Cow::Borrowed("[j/k]select [Enter]read [r]efresh [Esc]back [q]uit"),
        Screen::WeeklyDetail => Cow::Borrowed("[j/k]scroll [PgDn/PgUp]page [Esc]back [q]uit"),
    }
}
