use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::remote::InteractionAction;

/// Reading time credited for each newly read article.
pub const READ_CREDIT_MINUTES: f64 = 0.5;

/// Per-article interaction facts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFacts {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub bookmarked: bool,
}

impl InteractionFacts {
    fn is_empty(&self) -> bool {
        !self.read && !self.bookmarked
    }
}

/// Everything one user has done with articles, plus the reading counters
/// derived from it.
///
/// Serialised as a plain JSON record. The older two-array layout
/// (`readArticles` / `bookmarkedArticles`) is still accepted when loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredState")]
pub struct InteractionState {
    facts: BTreeMap<String, InteractionFacts>,
    articles_read_today: u32,
    reading_time_minutes: f64,
    streak_days: u32,
    last_read_on: Option<NaiveDate>,
}

impl InteractionState {
    pub fn query(&self, article_id: &str) -> InteractionFacts {
        self.facts.get(article_id).copied().unwrap_or_default()
    }

    pub fn is_read(&self, article_id: &str) -> bool {
        self.query(article_id).read
    }

    pub fn is_bookmarked(&self, article_id: &str) -> bool {
        self.query(article_id).bookmarked
    }

    pub fn bookmark_count(&self) -> usize {
        self.facts.values().filter(|f| f.bookmarked).count()
    }

    pub fn read_count(&self) -> usize {
        self.facts.values().filter(|f| f.read).count()
    }

    pub fn reading_time_minutes(&self) -> f64 {
        self.reading_time_minutes
    }

    /// Articles read on `today`; zero if nothing has been read yet today.
    pub fn articles_read_today(&self, today: NaiveDate) -> u32 {
        if self.last_read_on == Some(today) {
            self.articles_read_today
        } else {
            0
        }
    }

    /// Current streak as seen on `today`. A streak survives until the end of
    /// the day after the last read.
    pub fn streak_days(&self, today: NaiveDate) -> u32 {
        match self.last_read_on {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.streak_days,
            _ => 0,
        }
    }

    /// Mark an article read. Returns true only on the unread → read
    /// transition; repeat calls change nothing.
    pub fn mark_read(&mut self, article_id: &str, today: NaiveDate) -> bool {
        let facts = self.facts.entry(article_id.to_string()).or_default();
        if facts.read {
            return false;
        }
        facts.read = true;

        self.roll_day(today);
        self.articles_read_today += 1;
        self.reading_time_minutes += READ_CREDIT_MINUTES;
        true
    }

    /// Flip the bookmark and return the new value.
    pub fn toggle_bookmark(&mut self, article_id: &str) -> bool {
        let facts = self.facts.entry(article_id.to_string()).or_default();
        facts.bookmarked = !facts.bookmarked;
        let now_bookmarked = facts.bookmarked;
        if facts.is_empty() {
            self.facts.remove(article_id);
        }
        now_bookmarked
    }

    /// OR-merge facts from the remote interaction table. Counters are not
    /// touched; they only track reads made on this device. Returns how many
    /// facts changed.
    pub fn merge_remote<'a, I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, InteractionAction)>,
    {
        let mut changed = 0;
        for (article_id, action) in rows {
            let facts = self.facts.entry(article_id.to_string()).or_default();
            let slot = match action {
                InteractionAction::Read => &mut facts.read,
                InteractionAction::Bookmark => &mut facts.bookmarked,
                InteractionAction::Share => {
                    if facts.is_empty() {
                        self.facts.remove(article_id);
                    }
                    continue;
                }
            };
            if !*slot {
                *slot = true;
                changed += 1;
            }
        }
        changed
    }

    fn roll_day(&mut self, today: NaiveDate) {
        match self.last_read_on {
            Some(last) if last == today => return,
            Some(last) if last.succ_opt() == Some(today) => {
                self.streak_days = self.streak_days.saturating_add(1);
            }
            _ => self.streak_days = 1,
        }
        self.articles_read_today = 0;
        self.last_read_on = Some(today);
    }
}

// ============================================================================
// Stored layouts
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredState {
    Current(CurrentLayout),
    Legacy(LegacyLayout),
}

#[derive(Deserialize)]
struct CurrentLayout {
    facts: BTreeMap<String, InteractionFacts>,
    #[serde(default)]
    articles_read_today: u32,
    #[serde(default)]
    reading_time_minutes: f64,
    #[serde(default)]
    streak_days: u32,
    #[serde(default)]
    last_read_on: Option<NaiveDate>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyLayout {
    read_articles: Vec<String>,
    bookmarked_articles: Vec<String>,
    reading_time: f64,
    articles_read_today: u32,
    streak: u32,
}

impl From<StoredState> for InteractionState {
    fn from(stored: StoredState) -> Self {
        match stored {
            StoredState::Current(c) => InteractionState {
                facts: c.facts.into_iter().filter(|(_, f)| !f.is_empty()).collect(),
                articles_read_today: c.articles_read_today,
                reading_time_minutes: c.reading_time_minutes,
                streak_days: c.streak_days,
                last_read_on: c.last_read_on,
            },
            StoredState::Legacy(legacy) => {
                tracing::info!(
                    read = legacy.read_articles.len(),
                    bookmarked = legacy.bookmarked_articles.len(),
                    "Migrating legacy interaction snapshot"
                );
                let mut facts: BTreeMap<String, InteractionFacts> = BTreeMap::new();
                for id in legacy.read_articles {
                    facts.entry(id).or_default().read = true;
                }
                for id in legacy.bookmarked_articles {
                    facts.entry(id).or_default().bookmarked = true;
                }
                InteractionState {
                    facts,
                    articles_read_today: legacy.articles_read_today,
                    reading_time_minutes: legacy.reading_time,
                    streak_days: legacy.streak,
                    last_read_on: None,
                }
            }
        }
    }
}
