//! SQLite relational sink
//!
//! One table per source with an autoincrement surrogate key, a unique
//! external-id column and a store-assigned `created_at`. Writes are
//! `INSERT OR IGNORE`, so the first-seen version of a record is kept.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::sinks::{RelationalSink, SinkError};
use crate::domain::{CanonicalRecord, RecordDetails, SourceKind};

const CREATE_SONGS_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS songs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        song_id TEXT NOT NULL UNIQUE,
        song_name TEXT,
        artist_name TEXT,
        artist_id INTEGER,
        album_name TEXT,
        album_id INTEGER,
        duration INTEGER,
        playlist_name TEXT,
        playlist_id TEXT,
        rank_num INTEGER,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
";

const CREATE_MOVIES_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS movies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        movie_id TEXT NOT NULL UNIQUE,
        title TEXT,
        score REAL,
        vote_count INTEGER,
        release_date TEXT,
        regions TEXT,
        types TEXT,
        actors TEXT,
        movie_url TEXT,
        cover_url TEXT,
        category TEXT,
        category_id TEXT,
        rank_num INTEGER,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
";

const INSERT_SONG_SQL: &str = r"
    INSERT OR IGNORE INTO songs
        (song_id, song_name, artist_name, artist_id, album_name, album_id,
         duration, playlist_name, playlist_id, rank_num)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const INSERT_MOVIE_SQL: &str = r"
    INSERT OR IGNORE INTO movies
        (movie_id, title, score, vote_count, release_date, regions, types,
         actors, movie_url, cover_url, category, category_id, rank_num)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

/// Song row as stored; every column but the id may be null
#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub song_name: Option<String>,
    pub artist_name: Option<String>,
    pub artist_id: Option<i64>,
    pub album_name: Option<String>,
    pub album_id: Option<i64>,
    pub duration: Option<i64>,
    pub playlist_name: Option<String>,
    pub playlist_id: Option<String>,
    pub rank_num: Option<i64>,
}

/// Movie row as stored; every column but the id may be null
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub movie_id: String,
    pub title: Option<String>,
    pub score: Option<f64>,
    pub vote_count: Option<i64>,
    pub release_date: Option<String>,
    pub regions: Option<String>,
    pub types: Option<String>,
    pub actors: Option<String>,
    pub movie_url: Option<String>,
    pub cover_url: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub rank_num: Option<i64>,
}

pub struct SqliteRelationalStore {
    pool: SqlitePool,
}

impl SqliteRelationalStore {
    /// Opens (creating if needed) the database at `database_url` and
    /// provisions both tables.
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| SinkError::Relational(sqlx::Error::Io(e)))?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // One writer at a time; the run is sequential
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(database_url, "relational store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), SinkError> {
        sqlx::query(CREATE_SONGS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_MOVIES_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Number of rows holding `external_id` in the table for `kind`
    pub async fn count_by_external_id(
        &self,
        kind: SourceKind,
        external_id: &str,
    ) -> Result<i64, SinkError> {
        let sql = match kind {
            SourceKind::Netease => "SELECT COUNT(*) FROM songs WHERE song_id = ?",
            SourceKind::Douban => "SELECT COUNT(*) FROM movies WHERE movie_id = ?",
        };
        let count: i64 = sqlx::query_scalar(sql)
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All song rows in insertion order
    pub async fn load_songs(&self) -> Result<Vec<SongRow>, SinkError> {
        let rows = sqlx::query(
            r"SELECT song_id, song_name, artist_name, artist_id, album_name, album_id,
                     duration, playlist_name, playlist_id, rank_num
              FROM songs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SongRow {
                    song_id: row.try_get("song_id")?,
                    song_name: row.try_get("song_name")?,
                    artist_name: row.try_get("artist_name")?,
                    artist_id: row.try_get("artist_id")?,
                    album_name: row.try_get("album_name")?,
                    album_id: row.try_get("album_id")?,
                    duration: row.try_get("duration")?,
                    playlist_name: row.try_get("playlist_name")?,
                    playlist_id: row.try_get("playlist_id")?,
                    rank_num: row.try_get("rank_num")?,
                })
            })
            .collect()
    }

    /// All movie rows in insertion order
    pub async fn load_movies(&self) -> Result<Vec<MovieRow>, SinkError> {
        let rows = sqlx::query(
            r"SELECT movie_id, title, score, vote_count, release_date, regions, types,
                     actors, movie_url, cover_url, category, category_id, rank_num
              FROM movies ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MovieRow {
                    movie_id: row.try_get("movie_id")?,
                    title: row.try_get("title")?,
                    score: row.try_get("score")?,
                    vote_count: row.try_get("vote_count")?,
                    release_date: row.try_get("release_date")?,
                    regions: row.try_get("regions")?,
                    types: row.try_get("types")?,
                    actors: row.try_get("actors")?,
                    movie_url: row.try_get("movie_url")?,
                    cover_url: row.try_get("cover_url")?,
                    category: row.try_get("category")?,
                    category_id: row.try_get("category_id")?,
                    rank_num: row.try_get("rank_num")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RelationalSink for SqliteRelationalStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_if_absent(&self, record: &CanonicalRecord) -> Result<bool, SinkError> {
        let result = match &record.details {
            RecordDetails::Song {
                artist_id,
                album_name,
                album_id,
                duration_secs,
            } => {
                sqlx::query(INSERT_SONG_SQL)
                    .bind(record.external_id.as_str())
                    .bind(&record.primary_label)
                    .bind(&record.attribution)
                    .bind(artist_id)
                    .bind(album_name)
                    .bind(album_id)
                    .bind(duration_secs)
                    .bind(&record.grouping_label)
                    .bind(&record.grouping_id)
                    .bind(i64::from(record.rank))
                    .execute(&self.pool)
                    .await?
            }
            RecordDetails::Movie {
                score,
                vote_count,
                release_date,
                regions,
                types,
                movie_url,
                cover_url,
            } => {
                sqlx::query(INSERT_MOVIE_SQL)
                    .bind(record.external_id.as_str())
                    .bind(&record.primary_label)
                    .bind(score)
                    .bind(vote_count)
                    .bind(release_date)
                    .bind(regions)
                    .bind(types)
                    .bind(&record.attribution)
                    .bind(movie_url)
                    .bind(cover_url)
                    .bind(&record.grouping_label)
                    .bind(&record.grouping_id)
                    .bind(i64::from(record.rank))
                    .execute(&self.pool)
                    .await?
            }
        };

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(external_id = %record.external_id, "relational row already present");
        }
        Ok(inserted)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
