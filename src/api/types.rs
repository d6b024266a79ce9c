use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::util::strip_control_chars;

/// Source label used when neither the record nor its URL names one.
const FALLBACK_SOURCE: &str = "AI News";

// ============================================================================
// Category
// ============================================================================

/// Topic of a short article.
///
/// The backend tags articles with one of a fixed set of labels. Labels it
/// adds later are preserved verbatim as `Other` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    AiModels,
    MachineLearning,
    Policy,
    Research,
    Industry,
    Startups,
    AiSecurity,
    AiTools,
    ComputerVision,
    NaturalLanguageProcessing,
    Robotics,
    Other(String),
}

/// Categories offered in the category picker.
pub const AVAILABLE_CATEGORIES: [Category; 8] = [
    Category::AiModels,
    Category::MachineLearning,
    Category::Policy,
    Category::Research,
    Category::Industry,
    Category::Startups,
    Category::AiSecurity,
    Category::AiTools,
];

impl Category {
    pub fn label(&self) -> &str {
        match self {
            Category::AiModels => "AI Models",
            Category::MachineLearning => "Machine Learning",
            Category::Policy => "Policy",
            Category::Research => "Research",
            Category::Industry => "Industry",
            Category::Startups => "Startups",
            Category::AiSecurity => "AI Security",
            Category::AiTools => "AI Tools",
            Category::ComputerVision => "Computer Vision",
            Category::NaturalLanguageProcessing => "Natural Language Processing",
            Category::Robotics => "Robotics",
            Category::Other(label) => label,
        }
    }

    /// Badge colour as 0xRRGGBB.
    pub fn color(&self) -> u32 {
        match self {
            Category::AiModels => 0x3B82F6,
            Category::MachineLearning => 0x10B981,
            Category::Policy => 0xF59E0B,
            Category::Research => 0x8B5CF6,
            Category::Industry => 0xEF4444,
            Category::Startups => 0x06B6D4,
            Category::AiSecurity => 0xDC2626,
            Category::AiTools => 0x059669,
            Category::ComputerVision => 0x7C3AED,
            Category::NaturalLanguageProcessing => 0xDB2777,
            Category::Robotics => 0xEA580C,
            Category::Other(_) => 0x6B7280,
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        match label.trim() {
            "AI Models" => Category::AiModels,
            "Machine Learning" => Category::MachineLearning,
            "Policy" => Category::Policy,
            "Research" => Category::Research,
            "Industry" | "Industry News" => Category::Industry,
            "Startups" => Category::Startups,
            "AI Security" => Category::AiSecurity,
            "AI Tools" => Category::AiTools,
            "Computer Vision" => Category::ComputerVision,
            "Natural Language Processing" => Category::NaturalLanguageProcessing,
            "Robotics" => Category::Robotics,
            other => Category::Other(other.to_string()),
        }
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Category::from(label.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Article
// ============================================================================

/// A short news brief, immutable once fetched.
///
/// Every field is already normalised: `source` is never empty and text has
/// been stripped of terminal control sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: Arc<str>,
    pub title: Arc<str>,
    pub summary: Arc<str>,
    pub original_url: Arc<str>,
    pub image_url: Option<Arc<str>>,
    pub category: Category,
    pub published_at: DateTime<Utc>,
    pub source: Arc<str>,
    pub view_count: u64,
}

/// An article exactly as the backend sends it.
///
/// Every field is optional so one malformed record does not fail the whole
/// feed; [`ArticleRecord::into_article`] fills the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArticleRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub original_url: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<String>,
    pub created_at: Option<String>,
    pub view_count: Option<u64>,
    pub source: Option<String>,
}

impl ArticleRecord {
    /// Normalise into an [`Article`]. Returns `None` when the record has no id,
    /// since nothing can be tracked against it.
    pub fn into_article(self) -> Option<Article> {
        let id = self.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())?;
        let original_url = clean(self.original_url.unwrap_or_default());

        let source = self
            .source
            .map(clean)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| source_from_url(&original_url))
            .unwrap_or_else(|| FALLBACK_SOURCE.to_string());

        let published_at = self
            .published_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp))
            .unwrap_or_else(|| {
                tracing::debug!(article_id = %id, "Article has no usable timestamp, using epoch");
                DateTime::<Utc>::UNIX_EPOCH
            });

        Some(Article {
            id: Arc::from(id),
            title: Arc::from(clean(self.title.unwrap_or_default())),
            summary: Arc::from(clean(self.summary.unwrap_or_default())),
            original_url: Arc::from(original_url),
            image_url: self
                .image_url
                .map(clean)
                .filter(|u| !u.is_empty())
                .map(Arc::from),
            category: Category::from(self.category.unwrap_or_default()),
            published_at,
            source: Arc::from(source),
            view_count: self.view_count.unwrap_or(0),
        })
    }
}

/// Derive a source label from an article URL: its host without a leading `www.`.
pub fn source_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then(|| host.to_string())
}

// ============================================================================
// Weekly Breakdown
// ============================================================================

/// A long-form "weekly breakdown" article.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyArticle {
    pub id: Arc<str>,
    pub title: Arc<str>,
    pub content: Arc<str>,
    pub summary: Arc<str>,
    pub author_name: Arc<str>,
    pub topic_category: Arc<str>,
    pub featured_image_url: Option<Arc<str>>,
    pub reading_time_minutes: u32,
    pub publish_date: DateTime<Utc>,
    pub week_number: u32,
    pub year: i32,
    pub view_count: u64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WeeklyArticleRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author_name: Option<String>,
    pub topic_category: Option<String>,
    pub featured_image_url: Option<String>,
    pub reading_time_minutes: Option<u32>,
    pub publish_date: Option<String>,
    pub created_at: Option<String>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    pub view_count: Option<u64>,
    pub tags: Option<Vec<String>>,
}

impl WeeklyArticleRecord {
    pub fn into_weekly(self) -> Option<WeeklyArticle> {
        let id = self.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())?;
        let publish_date = self
            .publish_date
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Some(WeeklyArticle {
            id: Arc::from(id),
            title: Arc::from(clean(self.title.unwrap_or_default())),
            content: Arc::from(clean(self.content.unwrap_or_default())),
            summary: Arc::from(clean(self.summary.unwrap_or_default())),
            author_name: Arc::from(
                self.author_name
                    .map(clean)
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| "NineT".to_string()),
            ),
            topic_category: Arc::from(clean(self.topic_category.unwrap_or_default())),
            featured_image_url: self.featured_image_url.map(clean).map(Arc::from),
            reading_time_minutes: self.reading_time_minutes.unwrap_or(0),
            publish_date,
            week_number: self.week_number.unwrap_or(0),
            year: self.year.unwrap_or_else(|| publish_date.year()),
            view_count: self.view_count.unwrap_or(0),
            tags: self
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(clean)
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn clean(s: String) -> String {
    match strip_control_chars(&s) {
        std::borrow::Cow::Borrowed(_) => s,
        std::borrow::Cow::Owned(cleaned) => cleaned,
    }
}

/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS[.frac]` form SQLite-backed
/// APIs emit (read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(id: &str, url: &str) -> ArticleRecord {
        ArticleRecord {
            id: Some(id.to_string()),
            title: Some("GPT-5 ships".to_string()),
            summary: Some("A summary".to_string()),
            original_url: Some(url.to_string()),
            category: Some("AI Models".to_string()),
            published_at: Some("2025-03-20T08:30:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_source_defaults_to_url_host() {
        let article = record("a1", "https://www.theverge.com/ai/123").into_article().unwrap();
        assert_eq!(&*article.source, "theverge.com");
    }

    #[test]
    fn test_explicit_source_wins() {
        let mut rec = record("a1", "https://www.theverge.com/ai/123");
        rec.source = Some("The Verge".to_string());
        assert_eq!(&*rec.into_article().unwrap().source, "The Verge");
    }

    #[test]
    fn test_source_falls_back_without_url() {
        let article = record("a1", "not a url").into_article().unwrap();
        assert_eq!(&*article.source, "AI News");
    }

    #[test]
    fn test_missing_id_is_skipped() {
        let mut rec = record("", "https://example.com");
        assert!(rec.clone().into_article().is_none());
        rec.id = None;
        assert!(rec.into_article().is_none());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 20, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-20T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-20T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-20 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_published_falls_back_to_created() {
        let mut rec = record("a1", "https://example.com");
        rec.published_at = Some("garbage".to_string());
        rec.created_at = Some("2025-01-02 03:04:05".to_string());
        let article = rec.into_article().unwrap();
        assert_eq!(article.published_at, Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_text_is_sanitised() {
        let mut rec = record("a1", "https://example.com");
        rec.title = Some("\x1b[2JCleared\x07".to_string());
        assert_eq!(&*rec.into_article().unwrap().title, "Cleared");
    }

    #[test]
    fn test_category_round_trip_and_aliases() {
        assert_eq!(Category::from("Industry News"), Category::Industry);
        assert_eq!(Category::from("Quantum"), Category::Other("Quantum".to_string()));
        assert_eq!(String::from(Category::AiSecurity), "AI Security");

        let json = serde_json::to_string(&Category::MachineLearning).unwrap();
        assert_eq!(json, "\"Machine Learning\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::MachineLearning);
    }

    #[test]
    fn test_weekly_defaults() {
        let rec = WeeklyArticleRecord {
            id: Some("w1".to_string()),
            title: Some("The Breakdown #12".to_string()),
            publish_date: Some("2025-03-17T00:00:00Z".to_string()),
            tags: Some(vec!["agents".to_string(), "".to_string()]),
            ..Default::default()
        };
        let weekly = rec.into_weekly().unwrap();
        assert_eq!(&*weekly.author_name, "NineT");
        assert_eq!(weekly.year, 2025);
        assert_eq!(weekly.tags, vec!["agents".to_string()]);
    }
}
