//! Integration tests for swipe navigation over a derived feed.
//!
//! These drive the feed controller and its navigator through complete
//! gestures the way the UI does, checking position, settle behaviour and
//! how the view reacts to bookmark changes.

use std::time::Duration;

use chrono::NaiveDate;
use ninet::api::{Article, ArticleRecord};
use ninet::feed::{
    compute_view, Direction, FeedController, FilterMode, GestureConfig, Phase, Preferences,
    Release, Settled, ViewMode,
};
use ninet::interactions::InteractionState;
use pretty_assertions::assert_eq;

fn articles(n: usize) -> Vec<Article> {
    let categories = ["Research", "Policy", "AI Tools"];
    (0..n)
        .map(|i| {
            ArticleRecord {
                id: Some(format!("a{i}")),
                title: Some(format!("Article {i}")),
                category: Some(categories[i % categories.len()].to_string()),
                original_url: Some(format!("https://www.example.com/{i}")),
                ..Default::default()
            }
            .into_article()
            .unwrap()
        })
        .collect()
}

fn controller(n: usize, state: &InteractionState) -> FeedController {
    let mut feed = FeedController::new(
        GestureConfig::default(),
        ViewMode::All,
        Preferences::default(),
    );
    feed.replace_articles(articles(n), state);
    feed
}

/// Drag, release and run the animation to completion.
fn swipe(feed: &mut FeedController, dy: f64, vy: f64) -> (Release, Option<Settled>) {
    let nav = feed.navigator_mut();
    assert!(nav.begin());
    nav.update(dy, vy);
    let release = nav.release();
    let settled = nav.tick(Duration::from_secs(1));
    (release, settled)
}

fn current_id(feed: &FeedController) -> Option<String> {
    feed.current_article().map(|a| a.id.to_string())
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

// ============================================================================
// Gesture sequences
// ============================================================================

#[test]
fn test_fast_long_swipe_from_first_moves_to_second() {
    let state = InteractionState::default();
    let mut feed = controller(5, &state);

    let (release, settled) = swipe(&mut feed, -150.0, -2.5);
    assert_eq!(release, Release::Commit(Direction::Next));
    assert_eq!(
        settled,
        Some(Settled::Moved {
            index: 1,
            direction: Direction::Next
        })
    );
    assert_eq!(feed.navigator().index(), 1);
    assert_eq!(feed.navigator().offset(), 0.0);
    assert_eq!(feed.navigator().phase(), Phase::Idle);
}

#[test]
fn test_swipe_past_last_springs_back() {
    let state = InteractionState::default();
    let mut feed = controller(5, &state);
    for _ in 0..4 {
        swipe(&mut feed, -150.0, 0.0);
    }
    assert_eq!(feed.navigator().index(), 4);

    let (release, settled) = swipe(&mut feed, -150.0, 0.0);
    assert_eq!(release, Release::Return);
    assert_eq!(settled, Some(Settled::Returned));
    assert_eq!(feed.navigator().index(), 4);
    assert_eq!(feed.navigator().offset(), 0.0);
}

#[test]
fn test_short_drag_returns_everywhere() {
    let state = InteractionState::default();
    let mut feed = controller(3, &state);
    for start in 0..3 {
        while feed.navigator().index() < start {
            swipe(&mut feed, -150.0, 0.0);
        }
        let (release, _) = swipe(&mut feed, 30.0, 0.0);
        assert_eq!(release, Release::Return);
        assert_eq!(feed.navigator().index(), start);
        assert_eq!(feed.navigator().offset(), 0.0);
    }
}

#[test]
fn test_edge_drag_is_damped() {
    let state = InteractionState::default();
    let mut feed = controller(3, &state);
    let nav = feed.navigator_mut();
    nav.begin();
    nav.update(60.0, 0.0);
    // Dragging toward "previous" at the first article meets resistance
    assert!(nav.offset() < 60.0);
    nav.update(-60.0, 0.0);
    assert_eq!(nav.offset(), -60.0);
}

#[test]
fn test_thresholds_are_tunable() {
    let state = InteractionState::default();
    let config = GestureConfig {
        commit_distance: 50.0,
        commit_velocity: 0.3,
        ..GestureConfig::default()
    };
    let mut feed = FeedController::new(config, ViewMode::All, Preferences::default());
    feed.replace_articles(articles(3), &state);

    let (release, _) = swipe(&mut feed, -55.0, 0.0);
    assert_eq!(release, Release::Commit(Direction::Next));
    let (release, _) = swipe(&mut feed, -10.0, -0.4);
    assert_eq!(release, Release::Commit(Direction::Next));
}

#[test]
fn test_previous_requires_text_at_top() {
    let state = InteractionState::default();
    let mut feed = controller(3, &state);
    swipe(&mut feed, -150.0, 0.0);

    feed.navigator_mut().scroll_rows_by(5);
    let (release, _) = swipe(&mut feed, 150.0, 0.0);
    assert_eq!(release, Release::Return);
    assert_eq!(feed.navigator().index(), 1);

    feed.navigator_mut().set_scroll_offset(0.0);
    let (release, _) = swipe(&mut feed, 150.0, 0.0);
    assert_eq!(release, Release::Commit(Direction::Previous));
    assert_eq!(feed.navigator().index(), 0);
}

#[test]
fn test_gesture_ignored_while_animating() {
    let state = InteractionState::default();
    let mut feed = controller(5, &state);
    let nav = feed.navigator_mut();
    assert_eq!(nav.flick(Direction::Next), Release::Commit(Direction::Next));
    // A second flick before the first settles is not recognised
    assert_eq!(nav.flick(Direction::Next), Release::Ignored);
    nav.tick(Duration::from_secs(1));
    assert_eq!(nav.index(), 1);
}

#[test]
fn test_single_article_disables_gestures() {
    let state = InteractionState::default();
    let mut feed = controller(1, &state);
    assert!(!feed.navigator_mut().begin());
    assert_eq!(current_id(&feed).as_deref(), Some("a0"));
}

// ============================================================================
// View derivation
// ============================================================================

#[test]
fn test_bookmarks_view_follows_toggles() {
    let mut state = InteractionState::default();
    let mut feed = controller(4, &state);
    state.toggle_bookmark("a1");
    state.toggle_bookmark("a3");

    feed.set_view_mode(ViewMode::BookmarksOnly, &state);
    let ids: Vec<_> = feed.view().articles.iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, vec!["a1", "a3"]);

    // Unbookmarking the focused article moves focus to what is left
    state.toggle_bookmark("a1");
    feed.refresh_interactions(&state);
    assert_eq!(current_id(&feed).as_deref(), Some("a3"));

    state.toggle_bookmark("a3");
    feed.refresh_interactions(&state);
    assert!(feed.current_article().is_none());
}

#[test]
fn test_bookmarks_bypass_category_filter() {
    let mut state = InteractionState::default();
    let raw: Vec<_> = articles(6).into_iter().map(std::sync::Arc::new).collect();
    for a in &raw {
        state.toggle_bookmark(&a.id);
    }
    let preferences = Preferences {
        selected_categories: Default::default(),
        filter_mode: FilterMode::Selected,
    };

    assert!(compute_view(&raw, &state, ViewMode::All, &preferences).is_empty());
    assert_eq!(
        compute_view(&raw, &state, ViewMode::BookmarksOnly, &preferences).len(),
        6
    );
}

#[test]
fn test_marking_read_keeps_position() {
    let mut state = InteractionState::default();
    let mut feed = controller(3, &state);
    swipe(&mut feed, -150.0, 0.0);

    state.mark_read("a1", day());
    feed.refresh_interactions(&state);
    assert_eq!(current_id(&feed).as_deref(), Some("a1"));
}

#[test]
fn test_refresh_resets_to_top() {
    let state = InteractionState::default();
    let mut feed = controller(5, &state);
    swipe(&mut feed, -150.0, 0.0);
    swipe(&mut feed, -150.0, 0.0);
    assert_eq!(feed.navigator().index(), 2);

    feed.replace_articles(articles(2), &state);
    assert_eq!(feed.navigator().index(), 0);
    assert_eq!(current_id(&feed).as_deref(), Some("a0"));

    feed.replace_articles(Vec::new(), &state);
    assert!(feed.current_article().is_none());
}
