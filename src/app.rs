use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use reqwest::redirect::Policy;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::{ApiClient, Article, FetchError, FetchedArticles, WeeklyArticle};
use crate::auth::{AuthClient, AuthError, Profile, SharedSession};
use crate::config::Config;
use crate::feed::{Direction, DwellTimer, FeedController, Preferences, ViewMode};
use crate::interactions::{
    InteractionRow, InteractionStore, RemoteError, RemoteInteractions, SyncJob, SyncSender,
};
use crate::storage::{preferences_key, user_key, Database};
use crate::util::{limit_words, validate_url_for_open};

/// Words of summary kept in a share message.
const SHARE_SUMMARY_WORDS: usize = 90;

/// How long a status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// HTTP Client
// ============================================================================

/// Shared HTTP client for the article API, auth and the interaction table.
///
/// Per-request deadlines come from the configured request timeout; the
/// client-level timeout is only a backstop.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    // PERF-019: Configure HTTP client with connection pooling and keepalive
    reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("ninet/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

// ============================================================================
// Screens and Overlays
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Feed,
    WeeklyList,
    WeeklyDetail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    /// Category picker; `cursor` indexes `AVAILABLE_CATEGORIES`.
    Categories { cursor: usize },
    /// Preview of the text that was prepared for sharing.
    Share { message: String },
}

/// Weekly breakdown list and detail state.
#[derive(Debug, Default)]
pub struct WeeklyState {
    pub articles: Vec<Arc<WeeklyArticle>>,
    pub selected: usize,
    pub scroll: u16,
    pub loading: bool,
    pub loaded: bool,
    pub error: Option<&'static str>,
}

impl WeeklyState {
    pub fn selected_article(&self) -> Option<&Arc<WeeklyArticle>> {
        self.articles.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.articles.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events from background tasks
pub enum AppEvent {
    /// Article feed fetch finished.
    ///
    /// `generation` is the value of `App::feed_generation` when the fetch was
    /// spawned; results from superseded fetches are dropped.
    ArticlesLoaded {
        generation: u64,
        result: Result<FetchedArticles, FetchError>,
    },
    WeeklyLoaded {
        generation: u64,
        result: Result<Vec<WeeklyArticle>, FetchError>,
    },
    /// The article opened by id at startup was fetched.
    LinkedArticleLoaded {
        id: Arc<str>,
        result: Result<Article, FetchError>,
    },
    /// Remote interaction rows fetched at startup for merging.
    RemoteInteractionsLoaded(Result<Vec<InteractionRow>, RemoteError>),
    ProfileLoaded(Result<Option<Profile>, AuthError>),
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

/// Long-lived handles the app talks through.
#[derive(Clone)]
pub struct Services {
    pub db: Database,
    pub api: ApiClient,
    pub auth: Option<AuthClient>,
    pub remote: Option<RemoteInteractions>,
    pub sync_tx: SyncSender,
}

/// Central application state
pub struct App {
    pub services: Services,
    pub session: Option<SharedSession>,
    pub profile: Option<Profile>,
    /// Article id to fetch and focus once the UI starts.
    pub linked_article: Option<Arc<str>>,

    pub feed: FeedController,
    pub store: InteractionStore,
    pub dwell: DwellTimer,

    pub screen: Screen,
    pub overlay: Option<Overlay>,
    pub weekly: WeeklyState,

    /// An article fetch is in flight.
    pub loading: bool,
    /// At least one article fetch has succeeded.
    pub loaded_once: bool,
    /// Shown when the last fetch failed; `r` retries.
    pub retry_prompt: Option<&'static str>,
    pub status_message: Option<(Cow<'static, str>, Instant)>,

    /// PERF-010: Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,

    /// Rows the focused article can scroll before its text runs out.
    /// Updated while rendering.
    pub article_max_scroll: u16,

    /// Incremented for every feed fetch; see [`AppEvent::ArticlesLoaded`].
    pub feed_generation: u64,
    feed_handle: Option<JoinHandle<()>>,
    pub weekly_generation: u64,
    weekly_handle: Option<JoinHandle<()>>,

    last_tick: Instant,
}

impl App {
    pub fn new(
        services: Services,
        config: &Config,
        store: InteractionStore,
        session: Option<SharedSession>,
        preferences: Preferences,
        view_mode: ViewMode,
    ) -> Self {
        Self {
            services,
            session,
            profile: None,
            linked_article: None,
            feed: FeedController::new(config.gesture.clone(), view_mode, preferences),
            store,
            dwell: DwellTimer::new(config.dwell()),
            screen: Screen::Feed,
            overlay: None,
            weekly: WeeklyState::default(),
            loading: false,
            loaded_once: false,
            retry_prompt: None,
            status_message: None,
            needs_redraw: true,
            article_max_scroll: 0,
            feed_generation: 0,
            feed_handle: None,
            weekly_generation: 0,
            weekly_handle: None,
            last_tick: Instant::now(),
        }
    }

    pub fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    pub fn current_article(&self) -> Option<&Arc<Article>> {
        self.feed.current_article()
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Start a feed fetch, superseding any fetch still in flight.
    pub fn request_articles(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        if let Some(handle) = self.feed_handle.take() {
            handle.abort();
            tracing::debug!(generation = self.feed_generation, "Aborted superseded feed fetch");
        }
        self.feed_generation = self.feed_generation.wrapping_add(1);
        let generation = self.feed_generation;
        self.loading = true;
        self.needs_redraw = true;

        let api = self.services.api.clone();
        let tx = event_tx.clone();
        self.feed_handle = Some(spawn_guarded("feed_fetch", event_tx.clone(), async move {
            let result = api.fetch_articles().await;
            if let Err(e) = tx.send(AppEvent::ArticlesLoaded { generation, result }).await {
                tracing::warn!(error = %e, event = "ArticlesLoaded", "Channel send failed (receiver dropped)");
            }
        }));
    }

    /// Apply a finished feed fetch. Returns false for a stale result.
    ///
    /// A failure keeps whatever was loaded before and raises the retry prompt;
    /// an empty success clears both.
    pub fn apply_articles(
        &mut self,
        generation: u64,
        result: Result<FetchedArticles, FetchError>,
    ) -> bool {
        if generation != self.feed_generation {
            tracing::debug!(
                expected = self.feed_generation,
                got = generation,
                "Ignoring stale feed fetch (generation mismatch)"
            );
            return false;
        }
        self.feed_handle = None;
        self.loading = false;
        self.needs_redraw = true;

        match result {
            Ok(fetched) => {
                let count = fetched.articles.len();
                self.feed.replace_articles(fetched.articles, self.store.state());
                self.retry_prompt = None;
                self.loaded_once = true;
                tracing::info!(count = count, "Feed updated");
            }
            Err(e) => {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "Feed fetch failed");
                self.retry_prompt = Some(e.user_message());
            }
        }
        true
    }

    pub fn request_weekly(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        if let Some(handle) = self.weekly_handle.take() {
            handle.abort();
        }
        self.weekly_generation = self.weekly_generation.wrapping_add(1);
        let generation = self.weekly_generation;
        self.weekly.loading = true;
        self.needs_redraw = true;

        let api = self.services.api.clone();
        let tx = event_tx.clone();
        self.weekly_handle = Some(spawn_guarded("weekly_fetch", event_tx.clone(), async move {
            let result = api.fetch_weekly_articles().await;
            if let Err(e) = tx.send(AppEvent::WeeklyLoaded { generation, result }).await {
                tracing::warn!(error = %e, event = "WeeklyLoaded", "Channel send failed (receiver dropped)");
            }
        }));
    }

    pub fn apply_weekly(
        &mut self,
        generation: u64,
        result: Result<Vec<WeeklyArticle>, FetchError>,
    ) -> bool {
        if generation != self.weekly_generation {
            tracing::debug!(
                expected = self.weekly_generation,
                got = generation,
                "Ignoring stale weekly fetch (generation mismatch)"
            );
            return false;
        }
        self.weekly_handle = None;
        self.weekly.loading = false;
        self.needs_redraw = true;

        match result {
            Ok(articles) => {
                self.weekly.articles = articles.into_iter().map(Arc::new).collect();
                self.weekly.selected = self.weekly.selected.min(self.weekly.articles.len().saturating_sub(1));
                self.weekly.error = None;
                self.weekly.loaded = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Weekly fetch failed");
                self.weekly.error = Some(e.user_message());
            }
        }
        true
    }

    /// Fetch the article named by [`App::linked_article`], if any.
    pub fn request_linked_article(&self, event_tx: &mpsc::Sender<AppEvent>) {
        let Some(id) = self.linked_article.clone() else {
            return;
        };
        let api = self.services.api.clone();
        let tx = event_tx.clone();
        spawn_guarded("linked_article_fetch", event_tx.clone(), async move {
            let result = api.fetch_article(&id).await;
            if let Err(e) = tx.send(AppEvent::LinkedArticleLoaded { id, result }).await {
                tracing::warn!(error = %e, event = "LinkedArticleLoaded", "Channel send failed (receiver dropped)");
            }
        });
    }

    /// Pin the linked article to the head of the feed and focus it.
    pub fn apply_linked_article(&mut self, id: &str, result: Result<Article, FetchError>) {
        self.needs_redraw = true;
        match result {
            Ok(article) => {
                if self.feed.pin_article(article, self.store.state()) {
                    tracing::info!(article_id = %id, "Focused linked article");
                } else {
                    self.set_status("Linked article is hidden by the current view");
                }
            }
            Err(FetchError::NotFound) => {
                tracing::warn!(article_id = %id, "Linked article not found");
                self.set_status(format!("Article {} not found", id));
            }
            Err(e) => {
                tracing::warn!(error = %e, article_id = %id, "Linked article fetch failed");
                self.set_status(e.user_message());
            }
        }
    }

    /// Fetch the user's remote interaction rows for a one-off merge.
    pub fn request_remote_interactions(&self, event_tx: &mpsc::Sender<AppEvent>) {
        let (Some(remote), Some(session)) = (self.services.remote.clone(), &self.session) else {
            return;
        };
        let user_id = session.user().id.clone();
        let tx = event_tx.clone();
        spawn_guarded("remote_interactions", event_tx.clone(), async move {
            let result = remote.list(&user_id).await;
            let _ = tx.send(AppEvent::RemoteInteractionsLoaded(result)).await;
        });
    }

    pub fn apply_remote_interactions(&mut self, result: Result<Vec<InteractionRow>, RemoteError>) {
        match result {
            Ok(rows) => {
                if self.store.merge_remote(&rows) > 0 {
                    self.feed.refresh_interactions(self.store.state());
                    self.needs_redraw = true;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load remote interactions"),
        }
    }

    pub fn request_profile(&self, event_tx: &mpsc::Sender<AppEvent>) {
        let (Some(auth), Some(session)) = (self.services.auth.clone(), self.session.clone()) else {
            return;
        };
        let tx = event_tx.clone();
        spawn_guarded("profile_fetch", event_tx.clone(), async move {
            let result = match session.fresh(Utc::now()).await {
                Ok(current) => auth.fetch_profile(&current).await,
                Err(e) => Err(e),
            };
            let _ = tx.send(AppEvent::ProfileLoaded(result)).await;
        });
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Advance animations, keep the dwell timer on the focused article and
    /// credit a read when it fires. Returns true if anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        let navigator = self.feed.navigator_mut();
        let was_moving = !navigator.is_idle();
        if let Some(settled) = navigator.tick(dt) {
            tracing::trace!(?settled, "Gesture settled");
        }
        let mut changed = was_moving;

        // Only an article on screen accrues dwell time
        let focused = match self.screen {
            Screen::Feed => self.feed.current_article().map(|a| Arc::clone(&a.id)),
            Screen::WeeklyList | Screen::WeeklyDetail => None,
        };
        self.dwell.focus(focused.as_ref(), now);
        if let Some(article_id) = self.dwell.poll(now) {
            changed |= self.mark_read(&article_id);
        }

        if changed {
            self.needs_redraw = true;
        }
        changed
    }

    // ========================================================================
    // Interactions
    // ========================================================================

    /// Idempotent; returns true when the article was newly marked.
    pub fn mark_read(&mut self, article_id: &Arc<str>) -> bool {
        if !self.store.mark_read(article_id, Self::today()) {
            return false;
        }
        self.feed.refresh_interactions(self.store.state());
        self.needs_redraw = true;
        true
    }

    pub fn toggle_bookmark_current(&mut self) {
        let Some(article_id) = self.current_article().map(|a| Arc::clone(&a.id)) else {
            return;
        };
        let bookmarked = self.store.toggle_bookmark(&article_id);
        self.feed.refresh_interactions(self.store.state());
        self.set_status(if bookmarked {
            "Bookmarked"
        } else {
            "Removed from bookmarks"
        });
    }

    /// Open the focused article's original link in the system browser.
    pub fn open_current(&mut self) {
        self.open_current_with(|url| open::that(url));
    }

    /// [`App::open_current`] with an injectable opener.
    pub fn open_current_with<F>(&mut self, opener: F)
    where
        F: FnOnce(&str) -> std::io::Result<()>,
    {
        let Some(article) = self.current_article().cloned() else {
            return;
        };
        let url = match validate_url_for_open(&article.original_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, article_id = %article.id, "Refusing to open article URL");
                self.set_status(format!("Cannot open link: {}", e));
                return;
            }
        };
        match opener(url.as_str()) {
            Ok(()) => {
                tracing::debug!(article_id = %article.id, "Opened article in browser");
                self.mark_read(&article.id);
                self.set_status("Opened in browser");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to launch browser");
                self.set_status(format!("Failed to open browser: {}", e));
            }
        }
    }

    pub fn share_current(&mut self) {
        let Some(article) = self.current_article().cloned() else {
            return;
        };
        let message = share_message(&article);
        self.store.record_share(&article.id);
        self.overlay = Some(Overlay::Share { message });
        self.needs_redraw = true;
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn next_article(&mut self) {
        self.feed.navigator_mut().flick(Direction::Next);
        self.needs_redraw = true;
    }

    /// Scroll back to the top first; only a press at the top pages back.
    pub fn previous_article(&mut self) {
        let navigator = self.feed.navigator_mut();
        if navigator.is_scrolled_to_top() {
            navigator.flick(Direction::Previous);
        } else {
            navigator.set_scroll_offset(0.0);
        }
        self.needs_redraw = true;
    }

    pub fn scroll_article(&mut self, rows: i32) {
        let max = self.article_max_scroll;
        let navigator = self.feed.navigator_mut();
        navigator.scroll_rows_by(rows);
        navigator.clamp_scroll_rows(max);
        self.needs_redraw = true;
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.feed.set_view_mode(mode, self.store.state()) {
            tracing::debug!(mode = mode.label(), "View mode changed");
            self.needs_redraw = true;
        }
    }

    pub fn toggle_view_mode(&mut self) {
        self.set_view_mode(self.feed.view_mode().toggled());
    }

    /// Edit the category preferences, re-derive the view and persist.
    pub fn update_preferences<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut Preferences),
    {
        let mut preferences = self.feed.preferences().clone();
        edit(&mut preferences);
        if &preferences == self.feed.preferences() {
            return;
        }

        let key = preferences_key(&user_key(self.store.user_id().map(|id| &**id)));
        match serde_json::to_string(&preferences) {
            Ok(payload) => {
                if self
                    .services
                    .sync_tx
                    .send(SyncJob::Snapshot { key, payload })
                    .is_err()
                {
                    tracing::warn!("Sync worker has stopped, preferences kept in memory only");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialise preferences"),
        }

        self.feed.set_preferences(preferences, self.store.state());
        self.needs_redraw = true;
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
        self.needs_redraw = true;
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

/// Load saved category preferences. Missing or corrupt entries yield defaults.
pub async fn load_preferences(db: &Database, user_id: Option<&str>) -> Preferences {
    let key = preferences_key(&user_key(user_id));
    match db.get_value(&key).await {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, key = %key, "Corrupt preferences, using defaults");
            Preferences::default()
        }),
        Ok(None) => Preferences::default(),
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "Failed to read preferences, using defaults");
            Preferences::default()
        }
    }
}

/// Text handed to the clipboard / share sheet for an article.
pub fn share_message(article: &Article) -> String {
    format!(
        "📰 {}\n\n{}\n\nRead more: {}\n\n🤖 Shared via NineT - AI Briefed by AI",
        article.title,
        limit_words(&article.summary, SHARE_SUMMARY_WORDS),
        article.original_url,
    )
}

// ============================================================================
// Background Tasks
// ============================================================================

/// Spawn `work`, reporting a panic as [`AppEvent::TaskPanicked`].
fn spawn_guarded<F>(task: &'static str, tx: mpsc::Sender<AppEvent>, work: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic_msg) = catch_task_panic(work).await {
            tracing::error!(task = task, error = %panic_msg, "Background task panicked");
            let _ = tx
                .send(AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                })
                .await;
        }
    })
}

/// Wraps a future to catch panics and convert them to errors.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    })
}

// ============================================================================
// Resource Cleanup
// ============================================================================

/// RES-002: Abort all in-flight fetches on App drop.
impl Drop for App {
    fn drop(&mut self) {
        if let Some(handle) = self.feed_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.weekly_handle.take() {
            handle.abort();
        }
    }
}
