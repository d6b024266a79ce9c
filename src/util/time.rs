use chrono::{DateTime, Utc};

/// Formats a publish timestamp relative to `now` the way the feed card shows it.
///
/// Under an hour is "Just now", under a day "{h}h ago", under a week
/// "{d}d ago", anything older the calendar date. Timestamps in the future
/// (clock skew between backend and client) count as "Just now".
pub fn format_time_ago(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - published).num_hours();
    if hours < 1 {
        return "Just now".to_string();
    }
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{}d ago", days);
    }
    published.format("%b %-d, %Y").to_string()
}
