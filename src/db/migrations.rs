//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Access the underlying pool (used by domain submodules)
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<Option<i64>> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?;
        let current_version = current_version.flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: Create initial schema
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN").execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = async {
            Self::create_event_schema(conn).await?;
            Self::create_profile_schema(conn).await?;
            Self::create_release_cache_schema(conn).await?;
            Self::create_indexer_status_schema(conn).await?;
            Self::create_queue_schema(conn).await?;
            Self::create_blocklist_schema(conn).await?;
            Self::create_dvr_schema(conn).await?;
            Self::create_files_and_history_schema(conn).await?;
            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(|e| {
                    Error::Database(DatabaseError::MigrationFailed(format!(
                        "Failed to commit migration v1: {}",
                        e
                    )))
                })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    async fn create_event_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                sport TEXT NOT NULL,
                league TEXT,
                home_team TEXT,
                away_team TEXT,
                event_date INTEGER NOT NULL,
                broadcast_time INTEGER,
                external_id TEXT,
                monitored INTEGER NOT NULL DEFAULT 1,
                quality_profile_id INTEGER,
                has_file INTEGER NOT NULL DEFAULT 0,
                file_path TEXT,
                last_search_at INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .await?;
        exec(conn, "CREATE INDEX idx_events_monitored ON events(monitored, has_file)").await?;
        exec(conn, "CREATE INDEX idx_events_date ON events(event_date)").await?;

        exec(
            conn,
            r#"
            CREATE TABLE event_parts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                part_number INTEGER NOT NULL,
                monitored INTEGER NOT NULL DEFAULT 1,
                has_file INTEGER NOT NULL DEFAULT 0,
                UNIQUE(event_id, name)
            )
            "#,
        )
        .await
    }

    async fn create_profile_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE quality_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                items TEXT NOT NULL,
                cutoff TEXT,
                format_items TEXT NOT NULL DEFAULT '[]',
                min_format_score INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .await?;

        exec(
            conn,
            r#"
            CREATE TABLE custom_formats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                specifications TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .await
    }

    async fn create_release_cache_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE release_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guid TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                normalized_title TEXT NOT NULL,
                search_terms TEXT NOT NULL,
                download_url TEXT NOT NULL,
                info_url TEXT,
                indexer TEXT NOT NULL,
                protocol TEXT NOT NULL,
                infohash TEXT,
                size INTEGER NOT NULL DEFAULT 0,
                quality_label TEXT,
                codec TEXT,
                language TEXT,
                seeders INTEGER,
                leechers INTEGER,
                publish_date INTEGER,
                cached_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                from_rss INTEGER NOT NULL DEFAULT 0,
                sport_prefix TEXT,
                year INTEGER,
                round INTEGER,
                is_pack INTEGER NOT NULL DEFAULT 0,
                CHECK (expires_at > cached_at)
            )
            "#,
        )
        .await?;
        exec(conn, "CREATE INDEX idx_cache_expiry ON release_cache(expires_at)").await?;
        exec(
            conn,
            "CREATE INDEX idx_cache_sport_year ON release_cache(sport_prefix, year)",
        )
        .await
    }

    async fn create_indexer_status_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE indexer_status (
                indexer TEXT PRIMARY KEY,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                last_failure_reason TEXT,
                last_failure_at INTEGER,
                last_success_at INTEGER,
                disabled_until INTEGER,
                rate_limited_until INTEGER,
                queries_this_hour INTEGER NOT NULL DEFAULT 0,
                grabs_this_hour INTEGER NOT NULL DEFAULT 0,
                hour_reset_at INTEGER
            )
            "#,
        )
        .await
    }

    async fn create_queue_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE download_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                part_id INTEGER REFERENCES event_parts(id) ON DELETE SET NULL,
                client TEXT NOT NULL,
                download_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT,
                indexer TEXT NOT NULL,
                infohash TEXT,
                protocol TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                downloaded INTEGER NOT NULL DEFAULT 0,
                progress REAL NOT NULL DEFAULT 0.0,
                time_remaining_secs INTEGER,
                status INTEGER NOT NULL DEFAULT 0,
                status_message TEXT,
                resume_status INTEGER,
                retry_count INTEGER NOT NULL DEFAULT 0,
                missing_count INTEGER NOT NULL DEFAULT 0,
                grabbed_at INTEGER NOT NULL,
                completed_at INTEGER,
                imported_at INTEGER,
                CHECK (downloaded <= size OR size = 0),
                CHECK (progress >= 0.0 AND progress <= 100.0)
            )
            "#,
        )
        .await?;
        exec(conn, "CREATE INDEX idx_queue_status ON download_queue(status)").await?;
        exec(conn, "CREATE INDEX idx_queue_event ON download_queue(event_id)").await
    }

    async fn create_blocklist_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE blocklist (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                indexer TEXT NOT NULL,
                title TEXT NOT NULL,
                infohash TEXT,
                reason INTEGER NOT NULL,
                added_at INTEGER NOT NULL
            )
            "#,
        )
        .await?;
        // infohash is the key when known; otherwise the (event, indexer, title) triple
        exec(
            conn,
            "CREATE UNIQUE INDEX idx_blocklist_hash ON blocklist(infohash) WHERE infohash IS NOT NULL",
        )
        .await?;
        exec(
            conn,
            "CREATE UNIQUE INDEX idx_blocklist_triple ON blocklist(event_id, indexer, title) WHERE infohash IS NULL",
        )
        .await
    }

    async fn create_dvr_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE iptv_channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                tvg_id TEXT,
                stream_url TEXT NOT NULL,
                quality_score INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .await?;

        exec(
            conn,
            r#"
            CREATE TABLE league_channel_map (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                league TEXT NOT NULL,
                channel_id INTEGER NOT NULL REFERENCES iptv_channels(id) ON DELETE CASCADE,
                auto_mapped INTEGER NOT NULL DEFAULT 0,
                UNIQUE(league, channel_id)
            )
            "#,
        )
        .await?;

        exec(
            conn,
            r#"
            CREATE TABLE epg_programs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_tvg_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT,
                is_sports_program INTEGER NOT NULL DEFAULT 0,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL
            )
            "#,
        )
        .await?;
        exec(conn, "CREATE INDEX idx_epg_window ON epg_programs(start_time)").await?;

        exec(
            conn,
            r#"
            CREATE TABLE dvr_recordings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER REFERENCES events(id) ON DELETE CASCADE,
                part_id INTEGER REFERENCES event_parts(id) ON DELETE SET NULL,
                channel_id INTEGER NOT NULL REFERENCES iptv_channels(id),
                scheduled_start INTEGER NOT NULL,
                scheduled_end INTEGER NOT NULL,
                actual_start INTEGER,
                actual_end INTEGER,
                output_path TEXT NOT NULL,
                file_size INTEGER,
                detected_quality TEXT,
                quality_score INTEGER,
                format_score INTEGER,
                status INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .await?;
        exec(conn, "CREATE INDEX idx_recordings_status ON dvr_recordings(status)").await?;
        exec(conn, "CREATE INDEX idx_recordings_event ON dvr_recordings(event_id)").await
    }

    async fn create_files_and_history_schema(conn: &mut SqliteConnection) -> Result<()> {
        exec(
            conn,
            r#"
            CREATE TABLE event_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                part_name TEXT,
                path TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                quality_label TEXT NOT NULL,
                quality_score INTEGER NOT NULL DEFAULT 0,
                format_score INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL,
                codec TEXT,
                added_at INTEGER NOT NULL,
                on_disk INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .await?;
        exec(conn, "CREATE INDEX idx_files_event ON event_files(event_id)").await?;

        exec(
            conn,
            r#"
            CREATE TABLE history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                detail TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .await
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration {}: {}",
                    version, e
                )))
            })?;
        Ok(())
    }
}

async fn exec(conn: &mut SqliteConnection, sql: &str) -> Result<()> {
    sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
        Error::Database(DatabaseError::MigrationFailed(format!(
            "Migration statement failed: {}",
            e
        )))
    })?;
    Ok(())
}
