use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Fires once per continuous focus of an article.
///
/// Moving the focus elsewhere, even for a moment, restarts the clock for the
/// next article and forfeits the credit for the previous one.
#[derive(Debug, Clone)]
pub struct DwellTimer {
    threshold: Duration,
    focus: Option<Focus>,
}

#[derive(Debug, Clone)]
struct Focus {
    article_id: Arc<str>,
    since: Instant,
    fired: bool,
}

impl DwellTimer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            focus: None,
        }
    }

    /// Report which article is focused at `now`. Re-reporting the same id
    /// keeps the running clock.
    pub fn focus(&mut self, article_id: Option<&Arc<str>>, now: Instant) {
        match (article_id, &self.focus) {
            (Some(id), Some(current)) if current.article_id == *id => {}
            (Some(id), _) => {
                self.focus = Some(Focus {
                    article_id: Arc::clone(id),
                    since: now,
                    fired: false,
                });
            }
            (None, _) => self.focus = None,
        }
    }

    /// The focused article id, once, after it has been focused for the
    /// threshold.
    pub fn poll(&mut self, now: Instant) -> Option<Arc<str>> {
        let focus = self.focus.as_mut()?;
        if focus.fired || now.saturating_duration_since(focus.since) < self.threshold {
            return None;
        }
        focus.fired = true;
        Some(Arc::clone(&focus.article_id))
    }
}
