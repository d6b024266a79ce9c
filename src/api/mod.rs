//! Client for the NineT article backend.
//!
//! - [`types`]: wire records, the immutable [`Article`] / [`WeeklyArticle`]
//!   values and the ingestion-time normalisation between them
//! - [`client`]: HTTP retrieval with timeout, size cap and envelope handling

mod client;
mod types;

pub use client::{ApiClient, FetchError, FetchedArticles};
pub use types::{
    source_from_url, Article, ArticleRecord, Category, WeeklyArticle, WeeklyArticleRecord,
    AVAILABLE_CATEGORIES,
};
