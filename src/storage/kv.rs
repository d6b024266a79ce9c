use anyhow::Result;

use super::schema::Database;

/// Key under which the signed-in session is stored.
pub const SESSION_KEY: &str = "auth.session";

/// Storage scope for a user: their id, or `anonymous` when signed out.
pub fn user_key(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => "anonymous".to_string(),
    }
}

/// Key of the interaction snapshot for a storage scope.
pub fn interactions_key(user_key: &str) -> String {
    format!("interactions.{}", user_key)
}

/// Key of the feed preferences for a storage scope.
pub fn preferences_key(user_key: &str) -> String {
    format!("preferences.{}", user_key)
}

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get a stored value by key, `None` if the key was never written.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Store a value (UPSERT), bumping `updated_at`.
    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a key. Returns whether anything was deleted.
    pub async fn delete_value(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
