//! Integration tests for the article API against a mock backend.
//!
//! The app-level tests go through `App::request_*` and the event channel,
//! the same path the terminal UI uses.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use ninet::api::{ApiClient, Category, FetchError};
use ninet::app::{App, AppEvent, Services};
use ninet::config::Config;
use ninet::feed::{Preferences, ViewMode};
use ninet::interactions::{sync_channel, InteractionState, InteractionStore};
use ninet::storage::Database;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"{
    "success": true,
    "data": [
        {
            "id": "1",
            "title": "New frontier model",
            "summary": "A lab released a model.",
            "original_url": "https://www.labnews.ai/posts/1",
            "category": "AI Models",
            "published_at": "2025-03-01T08:30:00Z",
            "view_count": 42
        },
        {
            "title": "No id, cannot be tracked",
            "category": "Research"
        },
        {
            "id": "3",
            "title": "Chipmaker raises",
            "original_url": "https://example.com/chips",
            "category": "Industry News",
            "source": "Wire",
            "created_at": "2025-02-28 17:00:00"
        },
        {
            "id": "4",
            "title": "Quantum something",
            "category": "Quantum"
        }
    ]
}"#;

fn client(server: &MockServer, timeout: Duration) -> ApiClient {
    ApiClient::new(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        timeout,
    )
}

async fn app_for(server: &MockServer) -> App {
    let db = Database::open(":memory:").await.unwrap();
    let (sync_tx, _sync_rx) = sync_channel();
    let services = Services {
        db,
        api: client(server, Duration::from_secs(5)),
        auth: None,
        remote: None,
        sync_tx: sync_tx.clone(),
    };
    let store = InteractionStore::new(InteractionState::default(), None, sync_tx);
    App::new(
        services,
        &Config::default(),
        store,
        None,
        Preferences::default(),
        ViewMode::All,
    )
}

async fn next_event(rx: &mut mpsc::Receiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within 5s")
        .expect("channel open")
}

#[tokio::test]
async fn test_feed_records_are_normalised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let fetched = client(&server, Duration::from_secs(5))
        .fetch_articles()
        .await
        .unwrap();
    assert_eq!(fetched.skipped, 1);
    assert_eq!(fetched.articles.len(), 3);

    let first = &fetched.articles[0];
    assert_eq!(&*first.source, "labnews.ai");
    assert_eq!(first.category, Category::AiModels);
    assert_eq!(first.view_count, 42);
    assert_eq!(
        first.published_at,
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap()
    );

    let third = &fetched.articles[1];
    assert_eq!(&*third.source, "Wire");
    assert_eq!(third.category, Category::Industry);
    assert_eq!(
        third.published_at,
        Utc.with_ymd_and_hms(2025, 2, 28, 17, 0, 0).unwrap()
    );

    let fourth = &fetched.articles[2];
    assert_eq!(&*fourth.source, "AI News");
    assert_eq!(fourth.category, Category::Other("Quantum".to_string()));
}

#[tokio::test]
async fn test_app_keeps_feed_when_refresh_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut app = app_for(&server).await;
    let (tx, mut rx) = mpsc::channel(8);

    app.request_articles(&tx);
    let AppEvent::ArticlesLoaded { generation, result } = next_event(&mut rx).await else {
        panic!("expected ArticlesLoaded");
    };
    app.apply_articles(generation, result);
    assert_eq!(app.feed.view().len(), 3);
    assert!(app.retry_prompt.is_none());

    app.request_articles(&tx);
    let AppEvent::ArticlesLoaded { generation, result } = next_event(&mut rx).await else {
        panic!("expected ArticlesLoaded");
    };
    assert!(matches!(result, Err(FetchError::HttpStatus(502))));
    app.apply_articles(generation, result);

    assert_eq!(app.feed.view().len(), 3);
    assert_eq!(
        app.retry_prompt,
        Some("Server error. Please try again later.")
    );
}

#[tokio::test]
async fn test_app_loads_weekly_breakdowns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weekly-articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r##"{"success":true,"data":[
                {"id":"w1","title":"Week in AI","content":"# Models\n\nBig week.",
                 "summary":"Recap","week_number":9,"year":2025,"reading_time_minutes":6,
                 "publish_date":"2025-03-02T00:00:00Z","tags":["llm","policy"]}
            ]}"##,
        ))
        .mount(&server)
        .await;

    let mut app = app_for(&server).await;
    let (tx, mut rx) = mpsc::channel(8);
    app.request_weekly(&tx);
    assert!(app.weekly.loading);

    let AppEvent::WeeklyLoaded { generation, result } = next_event(&mut rx).await else {
        panic!("expected WeeklyLoaded");
    };
    assert!(app.apply_weekly(generation, result));
    assert!(!app.weekly.loading);

    let weekly = app.weekly.selected_article().unwrap();
    assert_eq!(&*weekly.title, "Week in AI");
    assert_eq!(&*weekly.author_name, "NineT");
    assert_eq!(weekly.week_number, 9);
    assert_eq!(weekly.tags, vec!["llm", "policy"]);
}

#[tokio::test]
async fn test_empty_feed_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
        .mount(&server)
        .await;

    let mut app = app_for(&server).await;
    let (tx, mut rx) = mpsc::channel(8);
    app.request_articles(&tx);
    let AppEvent::ArticlesLoaded { generation, result } = next_event(&mut rx).await else {
        panic!("expected ArticlesLoaded");
    };
    app.apply_articles(generation, result);

    assert!(app.current_article().is_none());
    assert!(app.retry_prompt.is_none());
    assert!(app.loaded_once);
}

#[tokio::test]
async fn test_linked_article_is_pinned_ahead_of_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"success":true,"data":{"id":"7","title":"Linked","category":"Research"}}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let mut app = app_for(&server).await;
    app.linked_article = Some("7".into());
    let (tx, mut rx) = mpsc::channel(8);

    app.request_linked_article(&tx);
    let AppEvent::LinkedArticleLoaded { id, result } = next_event(&mut rx).await else {
        panic!("expected LinkedArticleLoaded");
    };
    app.apply_linked_article(&id, result);
    assert_eq!(app.current_article().map(|a| &*a.title), Some("Linked"));

    // The feed arriving afterwards keeps it in front
    app.request_articles(&tx);
    let AppEvent::ArticlesLoaded { generation, result } = next_event(&mut rx).await else {
        panic!("expected ArticlesLoaded");
    };
    app.apply_articles(generation, result);
    assert_eq!(app.feed.view().len(), 4);
    assert_eq!(app.current_article().map(|a| &*a.id), Some("7"));
}

#[tokio::test]
async fn test_missing_linked_article_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut app = app_for(&server).await;
    app.linked_article = Some("404".into());
    let (tx, mut rx) = mpsc::channel(8);

    app.request_linked_article(&tx);
    let AppEvent::LinkedArticleLoaded { id, result } = next_event(&mut rx).await else {
        panic!("expected LinkedArticleLoaded");
    };
    assert!(matches!(result, Err(FetchError::NotFound)));
    app.apply_linked_article(&id, result);

    assert!(app.current_article().is_none());
    let (message, _) = app.status_message.clone().unwrap();
    assert_eq!(message, "Article 404 not found");
}
