//! Application event handling.
//!
//! Applies the results of background tasks (fetches, remote merges, profile
//! lookups) to the application state.

use crate::app::{App, AppEvent};

/// Handle one event from a background task.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::ArticlesLoaded { generation, result } => {
            let skipped = result.as_ref().map(|f| f.skipped).unwrap_or(0);
            if app.apply_articles(generation, result) && skipped > 0 {
                tracing::debug!(skipped, "Skipped articles without an id");
            }
        }
        AppEvent::WeeklyLoaded { generation, result } => {
            app.apply_weekly(generation, result);
        }
        AppEvent::LinkedArticleLoaded { id, result } => {
            app.apply_linked_article(&id, result);
        }
        AppEvent::RemoteInteractionsLoaded(result) => {
            app.apply_remote_interactions(result);
        }
        AppEvent::ProfileLoaded(result) => match result {
            Ok(profile) => {
                app.profile = profile;
                app.needs_redraw = true;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load profile"),
        },
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {} task", task));
        }
    }
}
