use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::User;
use crate::utils::datetime::{format_sortable_utc, format_stored_timestamp, parse_stored_timestamp};
use crate::utils::logging::{log_database_error, log_database_operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedingType {
    Bottle,
    LeftBreast,
    RightBreast,
}

impl FeedingType {
    pub const ALL: [FeedingType; 3] = [
        FeedingType::Bottle,
        FeedingType::LeftBreast,
        FeedingType::RightBreast,
    ];

    /// Code stored in `feeding_logs.feeding_type`.
    pub fn code(self) -> &'static str {
        match self {
            FeedingType::Bottle => "BOTTLE",
            FeedingType::LeftBreast => "LEFT_BREAST",
            FeedingType::RightBreast => "RIGHT_BREAST",
        }
    }

    /// Parses a stored code. The numeric codes come from rows written
    /// before the codes were spelled out.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "BOTTLE" | "7" => Some(FeedingType::Bottle),
            "LEFT_BREAST" | "8" => Some(FeedingType::LeftBreast),
            "RIGHT_BREAST" | "9" => Some(FeedingType::RightBreast),
            _ => None,
        }
    }
}

impl fmt::Display for FeedingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Raw `feeding_logs` row.
///
/// `timestamp` is what was written; `timestamp_utc` is the same instant in a
/// sortable form, `None` until [`FeedingLog::normalize_pending`] has seen a
/// row written without it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FeedingLog {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: String,
    pub feeding_type: String,
    pub timestamp_utc: Option<String>,
}

/// A feeding log with its timestamp and type decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedingRecord {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Tz>,
    pub feeding_type: FeedingType,
}

impl FeedingLog {
    pub async fn append(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        timestamp: DateTime<Tz>,
        feeding_type: FeedingType,
    ) -> Result<Self, sqlx::Error> {
        let timestamp_str = format_stored_timestamp(&timestamp);
        let timestamp_utc = format_sortable_utc(&timestamp);

        let result = sqlx::query(
            "INSERT INTO feeding_logs (user_id, timestamp, feeding_type, timestamp_utc) VALUES (?, ?, ?, ?)"
        )
        .bind(user_id)
        .bind(&timestamp_str)
        .bind(feeding_type.code())
        .bind(&timestamp_utc)
        .execute(pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                log_database_error("INSERT", "feeding_logs", &e.to_string(), Some(&timestamp_str));
                return Err(e);
            }
        };

        log_database_operation(
            "INSERT",
            "feeding_logs",
            Some(&format!("user {} at {} ({})", user_id, timestamp_str, feeding_type)),
        );

        Ok(FeedingLog {
            id: result.last_insert_rowid(),
            user_id,
            timestamp: timestamp_str,
            feeding_type: feeding_type.code().to_string(),
            timestamp_utc: Some(timestamp_utc),
        })
    }

    pub async fn find_by_user(
        pool: &sqlx::SqlitePool,
        user_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FeedingLog>(
            "SELECT id, user_id, timestamp, feeding_type, timestamp_utc
             FROM feeding_logs WHERE user_id = ? ORDER BY id"
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_username(
        pool: &sqlx::SqlitePool,
        username: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FeedingLog>(
            "SELECT f.id, f.user_id, f.timestamp, f.feeding_type, f.timestamp_utc
             FROM feeding_logs f
             JOIN users u ON f.user_id = u.id
             WHERE u.username = ?
             ORDER BY f.id"
        )
        .bind(username)
        .fetch_all(pool)
        .await
    }

    /// Fills `timestamp_utc` for rows that lack it, for one user or for all
    /// when `user_id` is `None`. Naive timestamps are read in `storage_tz`.
    /// Rows whose timestamp cannot be parsed are left alone.
    pub async fn normalize_pending(
        pool: &sqlx::SqlitePool,
        user_id: Option<i64>,
        storage_tz: Tz,
    ) -> Result<u64, sqlx::Error> {
        let pending = sqlx::query_as::<_, FeedingLog>(
            "SELECT id, user_id, timestamp, feeding_type, timestamp_utc
             FROM feeding_logs
             WHERE timestamp_utc IS NULL AND (?1 IS NULL OR user_id = ?1)"
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut updated = 0;
        for row in pending {
            let timestamp = match parse_stored_timestamp(&row.timestamp, storage_tz) {
                Ok(t) => t,
                Err(e) => {
                    log_database_error("NORMALIZE", "feeding_logs", &e.to_string(), Some(&row.id.to_string()));
                    continue;
                }
            };

            updated += sqlx::query("UPDATE feeding_logs SET timestamp_utc = ? WHERE id = ?")
                .bind(format_sortable_utc(&timestamp))
                .bind(row.id)
                .execute(pool)
                .await?
                .rows_affected();
        }

        if updated > 0 {
            log_database_operation(
                "NORMALIZE",
                "feeding_logs",
                Some(&format!("{} legacy rows", updated)),
            );
        }
        Ok(updated)
    }

    /// Most recent feeding by `user_id`.
    pub async fn last_for_user(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        storage_tz: Tz,
    ) -> Result<Option<FeedingRecord>, sqlx::Error> {
        Self::normalize_pending(pool, Some(user_id), storage_tz).await?;

        // Usually one round trip; rows with an unknown type are stepped over.
        let mut skip: i64 = 0;
        loop {
            let row = sqlx::query_as::<_, FeedingLog>(
                "SELECT id, user_id, timestamp, feeding_type, timestamp_utc
                 FROM feeding_logs
                 WHERE user_id = ? AND timestamp_utc IS NOT NULL
                 ORDER BY timestamp_utc DESC, id DESC
                 LIMIT 1 OFFSET ?"
            )
            .bind(user_id)
            .bind(skip)
            .fetch_optional(pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };
            match row.decode(storage_tz) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    log_database_error("DECODE", "feeding_logs", &e.to_string(), Some(&row.id.to_string()));
                    skip += 1;
                }
            }
        }
    }

    /// Most recent feeding by username; `None` when nothing was logged yet.
    pub async fn last_for_username(
        pool: &sqlx::SqlitePool,
        username: &str,
        storage_tz: Tz,
    ) -> Result<Option<FeedingRecord>, sqlx::Error> {
        match User::find_by_username(pool, username).await? {
            Some(user) => Self::last_for_user(pool, user.id, storage_tz).await,
            None => Ok(None),
        }
    }

    /// Feedings at or after `since`, oldest first.
    pub async fn since_for_username(
        pool: &sqlx::SqlitePool,
        username: &str,
        since: DateTime<Utc>,
        storage_tz: Tz,
    ) -> Result<Vec<FeedingRecord>, sqlx::Error> {
        let Some(user) = User::find_by_username(pool, username).await? else {
            return Ok(Vec::new());
        };
        Self::normalize_pending(pool, Some(user.id), storage_tz).await?;

        let rows = sqlx::query_as::<_, FeedingLog>(
            "SELECT id, user_id, timestamp, feeding_type, timestamp_utc
             FROM feeding_logs
             WHERE user_id = ? AND timestamp_utc >= ?
             ORDER BY timestamp_utc ASC, id ASC"
        )
        .bind(user.id)
        .bind(format_sortable_utc(&since))
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| match row.decode(storage_tz) {
                Ok(record) => Some(record),
                Err(e) => {
                    log_database_error("DECODE", "feeding_logs", &e.to_string(), Some(&row.id.to_string()));
                    None
                }
            })
            .collect())
    }

    pub fn decode(&self, storage_tz: Tz) -> anyhow::Result<FeedingRecord> {
        let timestamp = parse_stored_timestamp(&self.timestamp, storage_tz)?;
        let feeding_type = FeedingType::from_code(&self.feeding_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown feeding type '{}'", self.feeding_type))?;

        Ok(FeedingRecord {
            id: self.id,
            user_id: self.user_id,
            timestamp,
            feeding_type,
        })
    }
}
