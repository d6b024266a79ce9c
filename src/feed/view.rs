use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{Article, Category, AVAILABLE_CATEGORIES};
use crate::interactions::InteractionState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    All,
    BookmarksOnly,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::All => ViewMode::BookmarksOnly,
            ViewMode::BookmarksOnly => ViewMode::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::All => "All",
            ViewMode::BookmarksOnly => "Bookmarks",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Selected,
}

/// Category filter, persisted per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub selected_categories: BTreeSet<Category>,
    pub filter_mode: FilterMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            selected_categories: AVAILABLE_CATEGORIES.iter().cloned().collect(),
            filter_mode: FilterMode::All,
        }
    }
}

impl Preferences {
    pub fn toggle_category(&mut self, category: &Category) {
        if !self.selected_categories.remove(category) {
            self.selected_categories.insert(category.clone());
        }
    }

    pub fn toggle_filter_mode(&mut self) {
        self.filter_mode = match self.filter_mode {
            FilterMode::All => FilterMode::Selected,
            FilterMode::Selected => FilterMode::All,
        };
    }

    fn admits(&self, category: &Category) -> bool {
        match self.filter_mode {
            FilterMode::All => true,
            FilterMode::Selected => self.selected_categories.contains(category),
        }
    }
}

/// The ordered articles currently presented.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView {
    pub articles: Vec<Arc<Article>>,
}

impl FeedView {
    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn position_of(&self, article_id: &str) -> Option<usize> {
        self.articles.iter().position(|a| &*a.id == article_id)
    }

    /// Same articles in the same order.
    pub fn same_members(&self, other: &FeedView) -> bool {
        self.articles.len() == other.articles.len()
            && self
                .articles
                .iter()
                .zip(&other.articles)
                .all(|(a, b)| a.id == b.id)
    }
}

/// Derive the presented feed. Order is preserved; bookmarks ignore the
/// category filter.
pub fn compute_view(
    articles: &[Arc<Article>],
    state: &InteractionState,
    mode: ViewMode,
    preferences: &Preferences,
) -> FeedView {
    let articles = articles
        .iter()
        .filter(|a| match mode {
            ViewMode::BookmarksOnly => state.is_bookmarked(&a.id),
            ViewMode::All => preferences.admits(&a.category),
        })
        .cloned()
        .collect();
    FeedView { articles }
}

/// The article at `index`, or `None` for an empty view or out-of-range index.
pub fn current_article(view: &FeedView, index: usize) -> Option<&Arc<Article>> {
    view.articles.get(index)
}
