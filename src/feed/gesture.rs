//! Swipe navigation between articles.
//!
//! [`Navigator`] turns a stream of drag samples into either a committed ±1
//! index change or a spring-back. Animations are driven by [`Navigator::tick`]
//! so the caller owns the clock; every path out of a drag ends with the
//! offset back at zero.

use std::time::Duration;

use serde::Deserialize;

/// Tunable swipe thresholds and animation timings.
///
/// Distances are logical pixels, velocities are pixels per millisecond.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Drag distance that commits a page change on release.
    pub commit_distance: f64,
    /// Release velocity that commits a page change regardless of distance.
    pub commit_velocity: f64,
    /// Offset multiplier while dragging inside the feed.
    pub drag_damping: f64,
    /// Offset multiplier while dragging past the first or last article.
    pub edge_damping: f64,
    /// Inner scroll below this counts as "at the top".
    pub scroll_top_epsilon: f64,
    /// Only allow swiping back while the article text is scrolled to the top.
    pub require_scroll_top_for_previous: bool,
    /// How far the outgoing card travels before the index changes.
    pub exit_distance: f64,
    pub exit_duration_ms: u64,
    pub return_duration_ms: u64,
    /// Logical pixels per terminal row, used to convert mouse drags.
    pub row_height: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            commit_distance: 100.0,
            commit_velocity: 2.0,
            drag_damping: 1.0,
            edge_damping: 0.35,
            scroll_top_epsilon: 5.0,
            require_scroll_top_for_previous: true,
            exit_distance: 800.0,
            exit_duration_ms: 220,
            return_duration_ms: 180,
            row_height: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    /// Sign of the visual offset when moving this way. Swiping up (negative
    /// `dy`) reveals the next article.
    fn sign(self) -> f64 {
        match self {
            Direction::Next => -1.0,
            Direction::Previous => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Idle,
    Dragging { dy: f64, vy: f64 },
    Committing { direction: Direction, from: f64, elapsed: Duration },
    Returning { from: f64, elapsed: Duration },
}

/// Outcome of [`Navigator::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Commit(Direction),
    Return,
    /// No drag was in progress.
    Ignored,
}

/// Reported by [`Navigator::tick`] when an animation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Moved { index: usize, direction: Direction },
    Returned,
}

/// Gesture state machine over a feed of `len` articles.
///
/// Invariant: when `len > 0`, `index < len`.
#[derive(Debug, Clone)]
pub struct Navigator {
    config: GestureConfig,
    len: usize,
    index: usize,
    phase: Phase,
    offset: f64,
    scroll_offset: f64,
}

impl Navigator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            len: 0,
            index: 0,
            phase: Phase::Idle,
            offset: 0.0,
            scroll_offset: 0.0,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current visual displacement of the focused card.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Committing { .. } | Phase::Returning { .. })
    }

    /// Start over on a new feed of `len` articles at index 0.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.index = 0;
        self.settle();
        self.scroll_offset = 0.0;
    }

    /// Point at `index` in a feed that now has `len` articles, clamping if
    /// needed. Any gesture in flight is abandoned. Scroll is kept only when
    /// the focus stays on the same article.
    pub fn retarget(&mut self, len: usize, index: usize, same_article: bool) {
        let clamped = index.min(len.saturating_sub(1));
        if !same_article || clamped != index {
            self.scroll_offset = 0.0;
        }
        self.len = len;
        self.index = clamped;
        self.settle();
    }

    // ========================================================================
    // Drag lifecycle
    // ========================================================================

    /// Start a drag. Returns false (and does nothing) while an animation is in
    /// flight or when there is nowhere to go.
    pub fn begin(&mut self) -> bool {
        if !self.is_idle() || self.len <= 1 {
            return false;
        }
        self.phase = Phase::Dragging { dy: 0.0, vy: 0.0 };
        self.offset = 0.0;
        true
    }

    /// Feed one move sample: total displacement `dy` since `begin` and the
    /// instantaneous velocity `vy`.
    pub fn update(&mut self, dy: f64, vy: f64) {
        let Phase::Dragging { .. } = self.phase else {
            return;
        };
        let past_edge = (dy > 0.0 && self.index == 0) || (dy < 0.0 && self.index + 1 >= self.len);
        let damping = if past_edge {
            self.config.edge_damping
        } else {
            self.config.drag_damping
        };
        self.phase = Phase::Dragging { dy, vy };
        self.offset = dy * damping;
    }

    /// Finish the drag, choosing between a commit and a spring-back.
    pub fn release(&mut self) -> Release {
        let Phase::Dragging { dy, vy } = self.phase else {
            return Release::Ignored;
        };

        match self.decide(dy, vy) {
            Some(direction) => {
                self.phase = Phase::Committing {
                    direction,
                    from: self.offset,
                    elapsed: Duration::ZERO,
                };
                Release::Commit(direction)
            }
            None => {
                self.start_return();
                Release::Return
            }
        }
    }

    /// Abandon the drag (focus lost, pointer left the window).
    pub fn cancel(&mut self) {
        if let Phase::Dragging { .. } = self.phase {
            self.start_return();
        }
    }

    /// Run a complete synthetic swipe, as if the user dragged exactly the
    /// commit distance. Keyboard paging goes through here so it obeys the
    /// same boundary rules as the mouse.
    pub fn flick(&mut self, direction: Direction) -> Release {
        if !self.begin() {
            return Release::Ignored;
        }
        self.update(direction.sign() * self.config.commit_distance, 0.0);
        self.release()
    }

    fn decide(&self, dy: f64, vy: f64) -> Option<Direction> {
        let d = self.config.commit_distance;
        let v = self.config.commit_velocity;

        // A blocked direction never masks a fling the other way
        let wants_next = dy <= -d || vy <= -v;
        let wants_previous = dy >= d || vy >= v;

        let can_next = self.index + 1 < self.len;
        let can_previous = self.index > 0
            && (!self.config.require_scroll_top_for_previous
                || self.scroll_offset < self.config.scroll_top_epsilon);

        match (wants_next && can_next, wants_previous && can_previous) {
            (true, true) => {
                // Both fire: distance decides, velocity breaks a tie
                if dy <= -d || (dy < d && vy <= -v) {
                    Some(Direction::Next)
                } else {
                    Some(Direction::Previous)
                }
            }
            (true, false) => Some(Direction::Next),
            (false, true) => Some(Direction::Previous),
            (false, false) => None,
        }
    }

    fn start_return(&mut self) {
        self.phase = Phase::Returning {
            from: self.offset,
            elapsed: Duration::ZERO,
        };
    }

    fn settle(&mut self) {
        self.phase = Phase::Idle;
        self.offset = 0.0;
    }

    // ========================================================================
    // Animation
    // ========================================================================

    /// Advance any running animation by `dt`.
    pub fn tick(&mut self, dt: Duration) -> Option<Settled> {
        match self.phase {
            Phase::Committing {
                direction,
                from,
                elapsed,
            } => {
                let elapsed = elapsed + dt;
                let t = progress(elapsed, self.config.exit_duration_ms);
                if t >= 1.0 {
                    self.index = match direction {
                        Direction::Next => (self.index + 1).min(self.len.saturating_sub(1)),
                        Direction::Previous => self.index.saturating_sub(1),
                    };
                    self.scroll_offset = 0.0;
                    self.settle();
                    return Some(Settled::Moved {
                        index: self.index,
                        direction,
                    });
                }
                let target = direction.sign() * self.config.exit_distance;
                self.offset = from + (target - from) * ease_out_cubic(t);
                self.phase = Phase::Committing {
                    direction,
                    from,
                    elapsed,
                };
                None
            }
            Phase::Returning { from, elapsed } => {
                let elapsed = elapsed + dt;
                let t = progress(elapsed, self.config.return_duration_ms);
                if t >= 1.0 {
                    self.settle();
                    return Some(Settled::Returned);
                }
                self.offset = from * (1.0 - ease_out_cubic(t));
                self.phase = Phase::Returning { from, elapsed };
                None
            }
            Phase::Idle | Phase::Dragging { .. } => None,
        }
    }

    // ========================================================================
    // Inner scroll
    // ========================================================================

    /// Scroll position of the focused article's text, in logical pixels.
    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn scroll_rows(&self) -> u16 {
        let rows = self.scroll_offset / self.config.row_height.max(1.0);
        rows.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }

    pub fn is_scrolled_to_top(&self) -> bool {
        self.scroll_offset < self.config.scroll_top_epsilon
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset.max(0.0);
    }

    pub fn scroll_rows_by(&mut self, rows: i32) {
        self.set_scroll_offset(self.scroll_offset + f64::from(rows) * self.config.row_height);
    }

    /// Keep scroll inside the rendered content (`max_rows` past the top).
    pub fn clamp_scroll_rows(&mut self, max_rows: u16) {
        let max = f64::from(max_rows) * self.config.row_height;
        if self.scroll_offset > max {
            self.scroll_offset = max;
        }
    }
}

fn progress(elapsed: Duration, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 1.0;
    }
    (elapsed.as_secs_f64() * 1000.0 / duration_ms as f64).min(1.0)
}

fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn navigator(len: usize) -> Navigator {
        let mut nav = Navigator::new(GestureConfig::default());
        nav.reset(len);
        nav
    }

    fn drag(nav: &mut Navigator, dy: f64, vy: f64) -> Release {
        nav.begin();
        nav.update(dy, vy);
        nav.release()
    }

    /// Run animations to completion.
    fn finish(nav: &mut Navigator) -> Option<Settled> {
        for _ in 0..100 {
            if let Some(settled) = nav.tick(Duration::from_millis(16)) {
                return Some(settled);
            }
        }
        None
    }

    #[test]
    fn test_fast_swipe_up_commits_next() {
        let mut nav = navigator(5);
        assert_eq!(drag(&mut nav, -150.0, -2.5), Release::Commit(Direction::Next));
        assert_eq!(
            finish(&mut nav),
            Some(Settled::Moved {
                index: 1,
                direction: Direction::Next
            })
        );
        assert_eq!(nav.index(), 1);
        assert_eq!(nav.offset(), 0.0);
        assert!(nav.is_idle());
    }

    #[test]
    fn test_swipe_past_last_returns() {
        let mut nav = navigator(5);
        nav.retarget(5, 4, false);
        assert_eq!(drag(&mut nav, -150.0, 0.0), Release::Return);
        assert_eq!(finish(&mut nav), Some(Settled::Returned));
        assert_eq!(nav.index(), 4);
        assert_eq!(nav.offset(), 0.0);
    }

    #[test]
    fn test_short_drag_returns() {
        for start in 0..5 {
            let mut nav = navigator(5);
            nav.retarget(5, start, false);
            assert_eq!(drag(&mut nav, 30.0, 0.1), Release::Return);
            finish(&mut nav);
            assert_eq!(nav.index(), start);
            assert_eq!(nav.offset(), 0.0);
        }
    }

    #[test]
    fn test_velocity_alone_commits() {
        let mut nav = navigator(3);
        nav.retarget(3, 1, false);
        assert_eq!(drag(&mut nav, 20.0, 2.5), Release::Commit(Direction::Previous));
        finish(&mut nav);
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn test_blocked_direction_falls_back_to_opposite_velocity() {
        // Pulled down past the threshold at the first article, then flung up
        let mut nav = navigator(3);
        assert_eq!(drag(&mut nav, 150.0, -2.5), Release::Commit(Direction::Next));
        finish(&mut nav);
        assert_eq!(nav.index(), 1);

        // Mirror case at the last article
        nav.retarget(3, 2, false);
        assert_eq!(drag(&mut nav, -150.0, 2.5), Release::Commit(Direction::Previous));
        finish(&mut nav);
        assert_eq!(nav.index(), 1);

        // Both directions open: distance still wins over velocity
        assert_eq!(drag(&mut nav, 150.0, -2.5), Release::Commit(Direction::Previous));
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let config = GestureConfig {
            commit_distance: 50.0,
            commit_velocity: 0.3,
            ..GestureConfig::default()
        };
        let mut nav = Navigator::new(config);
        nav.reset(3);
        assert_eq!(drag(&mut nav, -60.0, 0.0), Release::Commit(Direction::Next));
        finish(&mut nav);
        assert_eq!(drag(&mut nav, 0.0, -0.4), Release::Commit(Direction::Next));
    }

    #[test]
    fn test_previous_requires_scroll_top() {
        let mut nav = navigator(3);
        nav.retarget(3, 2, false);
        nav.set_scroll_offset(200.0);
        assert_eq!(drag(&mut nav, 150.0, 3.0), Release::Return);
        finish(&mut nav);
        assert_eq!(nav.index(), 2);

        nav.set_scroll_offset(0.0);
        assert_eq!(drag(&mut nav, 150.0, 3.0), Release::Commit(Direction::Previous));
    }

    #[test]
    fn test_previous_without_scroll_policy() {
        let config = GestureConfig {
            require_scroll_top_for_previous: false,
            ..GestureConfig::default()
        };
        let mut nav = Navigator::new(config);
        nav.reset(2);
        nav.retarget(2, 1, false);
        nav.set_scroll_offset(500.0);
        assert_eq!(drag(&mut nav, 150.0, 0.0), Release::Commit(Direction::Previous));
    }

    #[test]
    fn test_edge_damping_applies_past_boundaries() {
        let mut nav = navigator(3);
        nav.begin();
        nav.update(100.0, 0.0);
        assert_eq!(nav.offset(), 35.0);
        nav.update(-100.0, 0.0);
        assert_eq!(nav.offset(), -100.0);
    }

    #[test]
    fn test_single_article_disables_gestures() {
        let mut nav = navigator(1);
        assert!(!nav.begin());
        assert_eq!(nav.release(), Release::Ignored);
        assert_eq!(nav.flick(Direction::Next), Release::Ignored);

        let mut empty = navigator(0);
        assert!(!empty.begin());
    }

    #[test]
    fn test_begin_ignored_while_animating() {
        let mut nav = navigator(5);
        drag(&mut nav, -150.0, 0.0);
        assert!(nav.is_animating());
        assert!(!nav.begin());
        assert_eq!(nav.flick(Direction::Next), Release::Ignored);
        finish(&mut nav);
        assert_eq!(nav.index(), 1);
    }

    #[test]
    fn test_commit_resets_scroll() {
        let mut nav = navigator(3);
        nav.set_scroll_offset(3.0);
        drag(&mut nav, -150.0, 0.0);
        finish(&mut nav);
        assert_eq!(nav.scroll_offset(), 0.0);
    }

    #[test]
    fn test_offset_moves_toward_exit_during_commit() {
        let mut nav = navigator(3);
        drag(&mut nav, -120.0, 0.0);
        assert_eq!(nav.tick(Duration::from_millis(100)), None);
        assert!(nav.offset() < -120.0);
        assert!(nav.offset() > -800.0);
    }

    #[test]
    fn test_cancel_springs_back() {
        let mut nav = navigator(3);
        nav.begin();
        nav.update(-300.0, -5.0);
        nav.cancel();
        assert!(matches!(nav.phase(), Phase::Returning { .. }));
        finish(&mut nav);
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn test_zero_duration_settles_on_first_tick() {
        let config = GestureConfig {
            exit_duration_ms: 0,
            return_duration_ms: 0,
            ..GestureConfig::default()
        };
        let mut nav = Navigator::new(config);
        nav.reset(2);
        drag(&mut nav, -150.0, 0.0);
        assert!(matches!(nav.tick(Duration::ZERO), Some(Settled::Moved { index: 1, .. })));
    }

    #[test]
    fn test_retarget_clamps_and_keeps_scroll_for_same_article() {
        let mut nav = navigator(5);
        nav.retarget(5, 3, false);
        nav.set_scroll_offset(40.0);

        nav.retarget(4, 3, true);
        assert_eq!(nav.index(), 3);
        assert_eq!(nav.scroll_offset(), 40.0);

        nav.retarget(2, 3, true);
        assert_eq!(nav.index(), 1);
        assert_eq!(nav.scroll_offset(), 0.0);
    }

    #[test]
    fn test_scroll_rows_conversion() {
        let mut nav = navigator(2);
        nav.scroll_rows_by(3);
        assert_eq!(nav.scroll_rows(), 3);
        nav.scroll_rows_by(-10);
        assert_eq!(nav.scroll_rows(), 0);
        assert!(nav.is_scrolled_to_top());
        nav.scroll_rows_by(10);
        nav.clamp_scroll_rows(4);
        assert_eq!(nav.scroll_rows(), 4);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Begin,
        Update(f64, f64),
        Release,
        Cancel,
        Tick(u64),
        Flick(bool),
        Scroll(i32),
        Retarget(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Begin),
            (-400.0f64..400.0, -5.0f64..5.0).prop_map(|(dy, vy)| Op::Update(dy, vy)),
            Just(Op::Release),
            Just(Op::Cancel),
            (0u64..300).prop_map(Op::Tick),
            any::<bool>().prop_map(Op::Flick),
            (-5i32..5).prop_map(Op::Scroll),
            (0usize..8, 0usize..8).prop_map(|(len, idx)| Op::Retarget(len, idx)),
        ]
    }

    proptest! {
        #[test]
        fn prop_index_always_in_range(len in 1usize..8, ops in proptest::collection::vec(op(), 0..60)) {
            let mut nav = navigator(len);
            for op in ops {
                match op {
                    Op::Begin => { nav.begin(); }
                    Op::Update(dy, vy) => nav.update(dy, vy),
                    Op::Release => { nav.release(); }
                    Op::Cancel => nav.cancel(),
                    Op::Tick(ms) => { nav.tick(Duration::from_millis(ms)); }
                    Op::Flick(next) => {
                        nav.flick(if next { Direction::Next } else { Direction::Previous });
                    }
                    Op::Scroll(rows) => nav.scroll_rows_by(rows),
                    Op::Retarget(len, idx) => nav.retarget(len, idx, false),
                }
                if !nav.is_empty() {
                    prop_assert!(nav.index() < nav.len());
                }
            }

            // Every path ends settled with no residual offset
            nav.cancel();
            nav.tick(Duration::from_secs(10));
            prop_assert!(nav.is_idle());
            prop_assert_eq!(nav.offset(), 0.0);
        }

        #[test]
        fn prop_single_release_moves_at_most_one(start in 0usize..6, dy in -500.0f64..500.0, vy in -6.0f64..6.0) {
            let mut nav = navigator(6);
            nav.retarget(6, start, false);
            drag(&mut nav, dy, vy);
            nav.tick(Duration::from_secs(10));
            prop_assert!(nav.index().abs_diff(start) <= 1);
        }
    }
}
