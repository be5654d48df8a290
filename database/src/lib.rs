//! SQLite persistence for the bot: the dedup store of already-reposted
//! post keys, the group blacklist, and accumulated daily statistics.

use chrono::Utc;
use repostbot_core::{CoreError, CycleStats, DatabaseError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create_posted_posts",
        "CREATE TABLE IF NOT EXISTS posted_posts (
            post_id TEXT PRIMARY KEY,
            added_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "create_blacklist",
        "CREATE TABLE IF NOT EXISTS blacklist (
            group_id INTEGER PRIMARY KEY,
            reason TEXT
        )",
    ),
    (
        "create_stats",
        "CREATE TABLE IF NOT EXISTS stats (
            date TEXT PRIMARY KEY,
            total_posts INTEGER NOT NULL DEFAULT 0,
            published_posts INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0
        )",
    ),
];

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the SQLite database at `database_url`,
    /// e.g. `sqlite://posts.db`.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to database at {}", database_url);
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for (name, sql) in MIGRATIONS {
            sqlx::query(sql).execute(&self.pool).await.map_err(|e| {
                debug!("Migration {} failed: {}", name, e);
                DatabaseError::MigrationFailed {
                    migration: name.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Dedup membership check. Callers must treat a failure here as
    /// "do not publish", never as "not yet posted".
    pub async fn is_posted(&self, post_key: &str) -> Result<bool, CoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM posted_posts WHERE post_id = ?")
            .bind(post_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        Ok(row.is_some())
    }

    /// Records a successful repost. Idempotent: re-recording an existing
    /// key is a no-op, so a check/record race can never surface as an
    /// error to the caller.
    pub async fn mark_posted(&self, post_key: &str) -> Result<(), CoreError> {
        sqlx::query("INSERT INTO posted_posts (post_id) VALUES (?) ON CONFLICT(post_id) DO NOTHING")
            .bind(post_key)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    pub async fn is_blacklisted(&self, group_id: i64) -> Result<bool, CoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM blacklist WHERE group_id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        Ok(row.is_some())
    }

    pub async fn add_to_blacklist(&self, group_id: i64, reason: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO blacklist (group_id, reason) VALUES (?, ?)
             ON CONFLICT(group_id) DO UPDATE SET reason = excluded.reason",
        )
        .bind(group_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    /// Adds one cycle's counters into the row for today's date.
    pub async fn record_cycle_stats(&self, stats: &CycleStats) -> Result<(), CoreError> {
        let today = Utc::now().date_naive().to_string();
        sqlx::query(
            "INSERT INTO stats (date, total_posts, published_posts, errors)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(date) DO UPDATE SET
                 total_posts = total_posts + excluded.total_posts,
                 published_posts = published_posts + excluded.published_posts,
                 errors = errors + excluded.errors",
        )
        .bind(&today)
        .bind(stats.total_posts as i64)
        .bind(stats.published_posts as i64)
        .bind(stats.errors as i64)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    pub async fn stats_for_today(&self) -> Result<CycleStats, CoreError> {
        let today = Utc::now().date_naive().to_string();
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            "SELECT total_posts, published_posts, errors FROM stats WHERE date = ?",
        )
        .bind(&today)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        Ok(row
            .map(|(total, published, errors)| CycleStats {
                total_posts: total as u32,
                published_posts: published as u32,
                errors: errors as u32,
            })
            .unwrap_or_default())
    }

    /// Flushes and closes the pool. Called on shutdown so a publish that
    /// committed its dedup record is never lost.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}
