use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::logging::log_database_operation;

/// A Telegram user who has logged at least one feeding.
///
/// `id` is the Telegram user id, which is also the private chat id the
/// reminder job sends to.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

impl User {
    pub async fn find_by_username(
        pool: &sqlx::SqlitePool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, created_at FROM users WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    /// Returns the row for `username`, inserting it first if needed.
    ///
    /// Concurrent callers for the same name all get the same row: the insert
    /// is a no-op when the unique constraint already holds a row, and the
    /// follow-up select reads whichever insert won.
    pub async fn get_or_create(
        pool: &sqlx::SqlitePool,
        username: &str,
        telegram_id: i64,
    ) -> Result<Self, sqlx::Error> {
        if let Some(user) = Self::find_by_username(pool, username).await? {
            return Ok(user);
        }

        let now = Utc::now().to_rfc3339();
        let inserted = sqlx::query(
            "INSERT INTO users (id, username, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING"
        )
        .bind(telegram_id)
        .bind(username)
        .bind(&now)
        .execute(pool)
        .await?;

        if inserted.rows_affected() > 0 {
            log_database_operation("INSERT", "users", Some(username));
        }

        // A conflict on the id (same account, renamed) leaves no row for this
        // name, which surfaces as RowNotFound.
        Self::find_by_username(pool, username)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }
}
