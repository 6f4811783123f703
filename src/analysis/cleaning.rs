//! Cleaning of stored rows into export-ready records
//!
//! Steps, in order: drop repeated ids (first wins), fill missing text,
//! coerce numbers, drop rows outside the plausible range, add derived fields.

use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::infrastructure::{MovieRow, SongRow};

pub const UNKNOWN_SONG: &str = "未知歌曲";
pub const UNKNOWN_ARTIST: &str = "未知歌手";
pub const UNKNOWN_ALBUM: &str = "未知专辑";
pub const UNKNOWN_MOVIE: &str = "未知电影";
pub const UNKNOWN: &str = "未知";

/// Longest plausible song, in seconds
pub const MAX_SONG_DURATION_SECS: i64 = 3600;
pub const MAX_MOVIE_SCORE: f64 = 10.0;
pub const HIGH_RATING_THRESHOLD: f64 = 8.5;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CleanSong {
    pub song_id: String,
    pub song_name: String,
    pub artist_name: String,
    pub artist_id: i64,
    pub album_name: String,
    pub album_id: i64,
    pub duration: i64,
    pub duration_min: f64,
    pub playlist_name: String,
    pub playlist_id: String,
    pub rank_num: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CleanMovie {
    pub movie_id: String,
    pub title: String,
    pub score: f64,
    pub vote_count: i64,
    pub release_date: String,
    pub regions: String,
    pub types: String,
    pub actors: String,
    pub movie_url: String,
    pub cover_url: String,
    pub category: String,
    pub category_id: String,
    pub rank_num: i64,
    pub main_region: String,
    pub main_type: String,
    pub is_high_rating: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningSummary {
    pub input: usize,
    pub duplicates_removed: usize,
    pub out_of_range_removed: usize,
    pub output: usize,
}

/// Paths of one cleaned export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
}

fn filled(value: Option<String>, placeholder: &str) -> String {
    match value {
        Some(text) if !text.trim().is_empty() => text,
        _ => placeholder.to_string(),
    }
}

/// Keeps the first row for every id, preserving order
fn first_per_id<R>(rows: Vec<R>, id: impl Fn(&R) -> &str) -> Vec<R> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(id(row).to_string()))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First `/`-separated entry, or the placeholder when empty
fn main_entry(joined: &str) -> String {
    joined
        .split('/')
        .map(str::trim)
        .find(|part| !part.is_empty())
        .map_or_else(|| UNKNOWN.to_string(), str::to_string)
}

pub fn clean_songs(rows: Vec<SongRow>) -> (Vec<CleanSong>, CleaningSummary) {
    let input = rows.len();
    let unique = first_per_id(rows, |row| row.song_id.as_str());
    let after_dedup = unique.len();

    let cleaned: Vec<CleanSong> = unique
        .into_iter()
        .map(|row| {
            let duration = row.duration.unwrap_or(0);
            CleanSong {
                song_id: row.song_id,
                song_name: filled(row.song_name, UNKNOWN_SONG),
                artist_name: filled(row.artist_name, UNKNOWN_ARTIST),
                artist_id: row.artist_id.unwrap_or(0),
                album_name: filled(row.album_name, UNKNOWN_ALBUM),
                album_id: row.album_id.unwrap_or(0),
                duration,
                duration_min: round2(duration as f64 / 60.0),
                playlist_name: row.playlist_name.unwrap_or_default(),
                playlist_id: row.playlist_id.unwrap_or_default(),
                rank_num: row.rank_num.unwrap_or(0),
            }
        })
        .filter(|song| (0..=MAX_SONG_DURATION_SECS).contains(&song.duration))
        .collect();

    let summary = CleaningSummary {
        input,
        duplicates_removed: input - after_dedup,
        out_of_range_removed: after_dedup - cleaned.len(),
        output: cleaned.len(),
    };
    (cleaned, summary)
}

pub fn clean_movies(rows: Vec<MovieRow>) -> (Vec<CleanMovie>, CleaningSummary) {
    let input = rows.len();
    let unique = first_per_id(rows, |row| row.movie_id.as_str());
    let after_dedup = unique.len();

    let cleaned: Vec<CleanMovie> = unique
        .into_iter()
        .map(|row| {
            let score = row.score.unwrap_or(0.0);
            let regions = filled(row.regions, UNKNOWN);
            let types = filled(row.types, UNKNOWN);
            CleanMovie {
                movie_id: row.movie_id,
                title: filled(row.title, UNKNOWN_MOVIE),
                score,
                vote_count: row.vote_count.unwrap_or(0),
                release_date: row.release_date.unwrap_or_default(),
                main_region: main_entry(&regions),
                main_type: main_entry(&types),
                regions,
                types,
                actors: row.actors.unwrap_or_default(),
                movie_url: row.movie_url.unwrap_or_default(),
                cover_url: row.cover_url.unwrap_or_default(),
                category: row.category.unwrap_or_default(),
                category_id: row.category_id.unwrap_or_default(),
                rank_num: row.rank_num.unwrap_or(0),
                is_high_rating: score >= HIGH_RATING_THRESHOLD,
            }
        })
        .filter(|movie| (0.0..=MAX_MOVIE_SCORE).contains(&movie.score))
        .collect();

    let summary = CleaningSummary {
        input,
        duplicates_removed: input - after_dedup,
        out_of_range_removed: after_dedup - cleaned.len(),
        output: cleaned.len(),
    };
    (cleaned, summary)
}

/// Writes `{dir}/{stem}_cleaned.json` (indented) and `{dir}/{stem}_cleaned.csv`
/// (UTF-8 with BOM, so spreadsheet tools pick the right encoding).
pub fn write_cleaned<T: Serialize>(
    rows: &[T],
    dir: &Path,
    stem: &str,
) -> Result<CleanedFiles, ExportError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ExportError::Io { path, source }
    };

    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let files = CleanedFiles {
        json: dir.join(format!("{stem}_cleaned.json")),
        csv: dir.join(format!("{stem}_cleaned.csv")),
    };

    let json = serde_json::to_string_pretty(rows)?;
    std::fs::write(&files.json, json).map_err(io_error(files.json.as_path()))?;

    let mut file = File::create(&files.csv).map_err(io_error(files.csv.as_path()))?;
    file.write_all(UTF8_BOM).map_err(io_error(files.csv.as_path()))?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(io_error(files.csv.as_path()))?;

    Ok(files)
}
