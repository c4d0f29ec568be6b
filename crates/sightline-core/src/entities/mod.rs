//! Persistence layer.
//!
//! [`ImageStore`] and [`ChatStore`] define what the services need from the
//! database. [`SqliteStore`] implements both on top of a single sqlx pool; to
//! move to another backend implement the two traits for a new type and swap
//! the concrete type in the server's `AppState`.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required.

pub mod chat;
pub mod dao;
pub mod image;

pub use dao::{ChatMessage, ChatRole, ImageAnalysis, ImageRecord};

pub use chat::ChatStore;
pub use image::ImageStore;

use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// SQLite-backed image store and chat transcript.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    clock: MonotonicClock,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://sightline.db"`.
    /// Use [`SqliteStore::in_memory`] for tests: every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Single-connection in-memory database, migrated and ready.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;

        // Seed the clock so timestamps keep increasing across restarts even if
        // the wall clock stepped backwards.
        let (latest,): (Option<String>,) = sqlx::query_as(
            "SELECT MAX(created_at) FROM ( \
                 SELECT created_at FROM images \
                 UNION ALL \
                 SELECT created_at FROM chat_messages \
             )",
        )
        .fetch_one(&pool)
        .await?;
        let floor = latest
            .as_deref()
            .map(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(Self {
            pool,
            clock: MonotonicClock::starting_after(floor),
        })
    }

    /// Close the pool, waiting for in-flight queries to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Issues unique, strictly increasing microsecond timestamps.
#[derive(Debug)]
struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    fn starting_after(floor: DateTime<Utc>) -> Self {
        Self {
            last: Mutex::new(floor),
        }
    }

    fn next(&self) -> DateTime<Utc> {
        let now = truncate_to_micros(Utc::now());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = if now > *last {
            now
        } else {
            *last + TimeDelta::microseconds(1)
        };
        *last = next;
        next
    }
}

fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

/// Fixed-width RFC 3339 rendering. Lexicographic order of the stored text
/// equals chronological order, which the `ORDER BY created_at` queries rely on.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}
