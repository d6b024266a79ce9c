use std::sync::Arc;

use super::gesture::{GestureConfig, Navigator};
use super::view::{compute_view, current_article, FeedView, Preferences, ViewMode};
use crate::api::Article;
use crate::interactions::InteractionState;

/// Owns the raw article list and everything derived from it: the presented
/// view and the navigation position within it.
#[derive(Debug, Clone)]
pub struct FeedController {
    articles: Vec<Arc<Article>>,
    view_mode: ViewMode,
    preferences: Preferences,
    view: FeedView,
    navigator: Navigator,
    /// Opened by id from the command line; kept at the head of the feed.
    pinned: Option<Arc<Article>>,
}

impl FeedController {
    pub fn new(gesture: GestureConfig, view_mode: ViewMode, preferences: Preferences) -> Self {
        Self {
            articles: Vec::new(),
            view_mode,
            preferences,
            view: FeedView::default(),
            navigator: Navigator::new(gesture),
            pinned: None,
        }
    }

    pub fn view(&self) -> &FeedView {
        &self.view
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    /// Whether any articles were loaded at all, regardless of filtering.
    pub fn has_articles(&self) -> bool {
        !self.articles.is_empty()
    }

    pub fn current_article(&self) -> Option<&Arc<Article>> {
        current_article(&self.view, self.navigator.index())
    }

    /// Swap in a freshly fetched list. Resets the position to the top.
    pub fn replace_articles(&mut self, articles: Vec<Article>, state: &InteractionState) {
        self.articles = articles.into_iter().map(Arc::new).collect();
        self.apply_pin();
        self.recompute(state);
    }

    /// Put `article` at the head of the feed, now and after every reload, and
    /// focus it. Returns false if the current view filters it out.
    pub fn pin_article(&mut self, article: Article, state: &InteractionState) -> bool {
        let id = Arc::clone(&article.id);
        self.pinned = Some(Arc::new(article));
        self.apply_pin();
        self.recompute(state);
        self.view.position_of(&id) == Some(0)
    }

    /// Returns false if `mode` was already active.
    pub fn set_view_mode(&mut self, mode: ViewMode, state: &InteractionState) -> bool {
        if mode == self.view_mode {
            return false;
        }
        self.view_mode = mode;
        self.recompute(state);
        true
    }

    pub fn set_preferences(&mut self, preferences: Preferences, state: &InteractionState) {
        self.preferences = preferences;
        self.recompute(state);
    }

    /// Re-derive the view after the interaction facts changed.
    ///
    /// Unlike the other setters this keeps the user where they were: the
    /// focused article stays focused if it is still in the view, otherwise
    /// the index is clamped. A view with unchanged membership leaves any
    /// gesture in flight alone.
    pub fn refresh_interactions(&mut self, state: &InteractionState) {
        let next = compute_view(&self.articles, state, self.view_mode, &self.preferences);
        if next.same_members(&self.view) {
            self.view = next;
            return;
        }

        let focused = self.current_article().map(|a| Arc::clone(&a.id));
        let index = self.navigator.index();
        self.view = next;

        if self.view.is_empty() {
            self.navigator.reset(0);
            return;
        }
        match focused.and_then(|id| self.view.position_of(&id)) {
            Some(pos) => self.navigator.retarget(self.view.len(), pos, true),
            None => self.navigator.retarget(self.view.len(), index, false),
        }
    }

    fn apply_pin(&mut self) {
        let Some(pinned) = &self.pinned else {
            return;
        };
        self.articles.retain(|a| a.id != pinned.id);
        self.articles.insert(0, Arc::clone(pinned));
    }

    fn recompute(&mut self, state: &InteractionState) {
        self.view = compute_view(&self.articles, state, self.view_mode, &self.preferences);
        self.navigator.reset(self.view.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ArticleRecord;
    use crate::feed::gesture::Direction;
    use std::time::Duration;

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| {
                ArticleRecord {
                    id: Some(format!("a{i}")),
                    category: Some("Research".to_string()),
                    ..Default::default()
                }
                .into_article()
                .unwrap()
            })
            .collect()
    }

    fn controller() -> FeedController {
        FeedController::new(GestureConfig::default(), ViewMode::All, Preferences::default())
    }

    fn step(feed: &mut FeedController, direction: Direction) {
        feed.navigator_mut().flick(direction);
        feed.navigator_mut().tick(Duration::from_secs(1));
    }

    fn current_id(feed: &FeedController) -> Option<String> {
        feed.current_article().map(|a| a.id.to_string())
    }

    #[test]
    fn test_replace_resets_to_top() {
        let state = InteractionState::default();
        let mut feed = controller();
        feed.replace_articles(articles(5), &state);
        step(&mut feed, Direction::Next);
        step(&mut feed, Direction::Next);
        assert_eq!(feed.navigator().index(), 2);

        feed.replace_articles(articles(3), &state);
        assert_eq!(feed.navigator().index(), 0);
        assert_eq!(current_id(&feed).as_deref(), Some("a0"));
    }

    #[test]
    fn test_view_mode_switch_resets_index() {
        let mut state = InteractionState::default();
        state.toggle_bookmark("a3");
        let mut feed = controller();
        feed.replace_articles(articles(5), &state);
        step(&mut feed, Direction::Next);

        assert!(feed.set_view_mode(ViewMode::BookmarksOnly, &state));
        assert!(!feed.set_view_mode(ViewMode::BookmarksOnly, &state));
        assert_eq!(feed.view().len(), 1);
        assert_eq!(current_id(&feed).as_deref(), Some("a3"));
    }

    #[test]
    fn test_unbookmark_in_bookmarks_view_clamps() {
        let mut state = InteractionState::default();
        for id in ["a1", "a2", "a4"] {
            state.toggle_bookmark(id);
        }
        let mut feed = controller();
        feed.replace_articles(articles(5), &state);
        feed.set_view_mode(ViewMode::BookmarksOnly, &state);
        step(&mut feed, Direction::Next);
        step(&mut feed, Direction::Next);
        assert_eq!(current_id(&feed).as_deref(), Some("a4"));

        state.toggle_bookmark("a4");
        feed.refresh_interactions(&state);
        assert_eq!(feed.view().len(), 2);
        assert_eq!(feed.navigator().index(), 1);
        assert_eq!(current_id(&feed).as_deref(), Some("a2"));

        state.toggle_bookmark("a1");
        state.toggle_bookmark("a2");
        feed.refresh_interactions(&state);
        assert!(feed.view().is_empty());
        assert!(feed.current_article().is_none());
    }

    #[test]
    fn test_refresh_keeps_focused_article() {
        let mut state = InteractionState::default();
        for id in ["a0", "a1", "a2"] {
            state.toggle_bookmark(id);
        }
        let mut feed = controller();
        feed.replace_articles(articles(3), &state);
        feed.set_view_mode(ViewMode::BookmarksOnly, &state);
        step(&mut feed, Direction::Next);
        assert_eq!(current_id(&feed).as_deref(), Some("a1"));

        // Removing an earlier article shifts the focused one down a slot
        state.toggle_bookmark("a0");
        feed.refresh_interactions(&state);
        assert_eq!(feed.navigator().index(), 0);
        assert_eq!(current_id(&feed).as_deref(), Some("a1"));
    }

    #[test]
    fn test_read_does_not_disturb_drag() {
        let mut state = InteractionState::default();
        let mut feed = controller();
        feed.replace_articles(articles(3), &state);
        feed.navigator_mut().begin();
        feed.navigator_mut().update(-40.0, 0.0);

        state.mark_read("a0", chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        feed.refresh_interactions(&state);
        assert_eq!(feed.navigator().offset(), -40.0);
    }

    #[test]
    fn test_preferences_filter_and_reset() {
        let state = InteractionState::default();
        let mut feed = controller();
        feed.replace_articles(articles(4), &state);
        step(&mut feed, Direction::Next);

        let mut prefs = Preferences::default();
        prefs.toggle_filter_mode();
        prefs.toggle_category(&crate::api::Category::Research);
        feed.set_preferences(prefs, &state);

        assert!(feed.view().is_empty());
        assert!(feed.has_articles());
        assert_eq!(feed.navigator().index(), 0);
    }

    #[test]
    fn test_pinned_article_leads_every_reload() {
        let state = InteractionState::default();
        let mut feed = controller();
        feed.replace_articles(articles(3), &state);
        step(&mut feed, Direction::Next);

        let linked = articles(3).remove(2);
        assert!(feed.pin_article(linked, &state));
        assert_eq!(current_id(&feed).as_deref(), Some("a2"));
        // No duplicate when the feed already carries it
        assert_eq!(feed.view().len(), 3);

        feed.replace_articles(articles(2), &state);
        assert_eq!(feed.view().len(), 3);
        assert_eq!(current_id(&feed).as_deref(), Some("a2"));
    }

    #[test]
    fn test_pinned_article_hidden_by_view() {
        let state = InteractionState::default();
        let mut feed = controller();
        feed.set_view_mode(ViewMode::BookmarksOnly, &state);
        assert!(!feed.pin_article(articles(1).remove(0), &state));
        assert!(feed.current_article().is_none());
    }
}
