//! Data quality assessment over stored rows

use std::collections::HashSet;
use std::fmt;

use crate::infrastructure::{MovieRow, SongRow};

/// A stored row the quality report can inspect
pub trait QualityRow {
    fn external_id(&self) -> &str;

    /// `(column, missing)` for every column other than the id.
    /// Null and empty text both count as missing.
    fn column_presence(&self) -> Vec<(&'static str, bool)>;

    /// Whether every column the analysis depends on is present
    fn is_complete(&self) -> bool;
}

fn missing_text(value: Option<&String>) -> bool {
    value.is_none_or(|text| text.is_empty())
}

impl QualityRow for SongRow {
    fn external_id(&self) -> &str {
        &self.song_id
    }

    fn column_presence(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("song_name", missing_text(self.song_name.as_ref())),
            ("artist_name", missing_text(self.artist_name.as_ref())),
            ("artist_id", self.artist_id.is_none()),
            ("album_name", missing_text(self.album_name.as_ref())),
            ("album_id", self.album_id.is_none()),
            ("duration", self.duration.is_none()),
            ("playlist_name", missing_text(self.playlist_name.as_ref())),
            ("playlist_id", missing_text(self.playlist_id.as_ref())),
            ("rank_num", self.rank_num.is_none()),
        ]
    }

    fn is_complete(&self) -> bool {
        self.column_presence().iter().all(|(_, missing)| !missing)
    }
}

impl QualityRow for MovieRow {
    fn external_id(&self) -> &str {
        &self.movie_id
    }

    fn column_presence(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("title", missing_text(self.title.as_ref())),
            ("score", self.score.is_none()),
            ("vote_count", self.vote_count.is_none()),
            ("release_date", missing_text(self.release_date.as_ref())),
            ("regions", missing_text(self.regions.as_ref())),
            ("types", missing_text(self.types.as_ref())),
            ("actors", missing_text(self.actors.as_ref())),
            ("movie_url", missing_text(self.movie_url.as_ref())),
            ("cover_url", missing_text(self.cover_url.as_ref())),
            ("category", missing_text(self.category.as_ref())),
            ("category_id", missing_text(self.category_id.as_ref())),
            ("rank_num", self.rank_num.is_none()),
        ]
    }

    /// Only the core columns: title, score, regions, types
    fn is_complete(&self) -> bool {
        self.title.is_some() && self.score.is_some() && self.regions.is_some() && self.types.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericRange {
    pub column: &'static str,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub total: usize,
    /// Columns with at least one missing value, in column order
    pub missing: Vec<(&'static str, usize)>,
    pub duplicate_ids: usize,
    pub complete: usize,
    pub distinct: Vec<(&'static str, usize)>,
    pub ranges: Vec<NumericRange>,
}

impl QualityReport {
    fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}

/// Counts shared by every row type
pub fn assess<R: QualityRow>(rows: &[R]) -> QualityReport {
    let mut missing: Vec<(&'static str, usize)> = Vec::new();
    for row in rows {
        for (i, (column, is_missing)) in row.column_presence().into_iter().enumerate() {
            if missing.len() <= i {
                missing.push((column, 0));
            }
            if is_missing {
                missing[i].1 += 1;
            }
        }
    }
    missing.retain(|(_, count)| *count > 0);

    let mut seen = HashSet::new();
    let duplicate_ids = rows.iter().filter(|row| !seen.insert(row.external_id())).count();

    QualityReport {
        total: rows.len(),
        missing,
        duplicate_ids,
        complete: rows.iter().filter(|row| row.is_complete()).count(),
        distinct: Vec::new(),
        ranges: Vec::new(),
    }
}

fn distinct<T: std::hash::Hash + Eq>(values: impl Iterator<Item = T>) -> usize {
    values.collect::<HashSet<_>>().len()
}

fn range(column: &'static str, values: impl Iterator<Item = f64>) -> Option<NumericRange> {
    values.fold(None, |acc, value| match acc {
        None => Some(NumericRange {
            column,
            min: value,
            max: value,
        }),
        Some(range) => Some(NumericRange {
            column,
            min: range.min.min(value),
            max: range.max.max(value),
        }),
    })
}

pub fn assess_songs(rows: &[SongRow]) -> QualityReport {
    let mut report = assess(rows);
    report.distinct = vec![
        ("songs", distinct(rows.iter().map(|r| r.song_id.as_str()))),
        ("artists", distinct(rows.iter().filter_map(|r| r.artist_id))),
        ("playlists", distinct(rows.iter().filter_map(|r| r.playlist_id.as_deref()))),
    ];
    report.ranges = range(
        "duration",
        rows.iter().filter_map(|r| r.duration).map(|d| d as f64),
    )
    .into_iter()
    .collect();
    report
}

pub fn assess_movies(rows: &[MovieRow]) -> QualityReport {
    let mut report = assess(rows);
    report.distinct = vec![
        ("movies", distinct(rows.iter().map(|r| r.movie_id.as_str()))),
        ("categories", distinct(rows.iter().filter_map(|r| r.category.as_deref()))),
    ];
    report.ranges = [
        range("score", rows.iter().filter_map(|r| r.score)),
        range(
            "vote_count",
            rows.iter().filter_map(|r| r.vote_count).map(|v| v as f64),
        ),
    ]
    .into_iter()
    .flatten()
    .collect();
    report
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total rows: {}", self.total)?;
        writeln!(f, "Missing values:")?;
        if self.missing.is_empty() {
            writeln!(f, "  - none")?;
        }
        for (column, count) in &self.missing {
            writeln!(f, "  - {column}: {count} ({:.2}%)", self.percent(*count))?;
        }
        writeln!(f, "Duplicate ids: {}", self.duplicate_ids)?;
        writeln!(
            f,
            "Complete rows: {} ({:.2}%)",
            self.complete,
            self.percent(self.complete)
        )?;
        for (what, count) in &self.distinct {
            writeln!(f, "Distinct {what}: {count}")?;
        }
        for range in &self.ranges {
            writeln!(f, "{} range: {} - {}", range.column, range.min, range.max)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str, artist_id: Option<i64>, name: Option<&str>) -> SongRow {
        SongRow {
            song_id: id.to_string(),
            song_name: name.map(str::to_string),
            artist_name: Some("A".to_string()),
            artist_id,
            album_name: Some(String::new()),
            album_id: Some(1),
            duration: Some(200),
            playlist_name: Some("热歌榜".to_string()),
            playlist_id: Some("3778678".to_string()),
            rank_num: Some(1),
        }
    }

    #[test]
    fn song_report_counts_missing_duplicates_and_distincts() {
        let rows = vec![
            song("1", Some(10), Some("a")),
            song("2", Some(10), None),
            song("1", None, Some("c")),
        ];
        let report = assess_songs(&rows);

        assert_eq!(report.total, 3);
        assert_eq!(report.duplicate_ids, 1);
        assert_eq!(
            report.missing,
            vec![("song_name", 1), ("artist_id", 1), ("album_name", 3)]
        );
        // empty album names make every row incomplete
        assert_eq!(report.complete, 0);
        assert_eq!(
            report.distinct,
            vec![("songs", 2), ("artists", 1), ("playlists", 1)]
        );
    }

    #[test]
    fn movie_report_has_score_and_vote_ranges() {
        let movie = |id: &str, score: Option<f64>, votes: i64| MovieRow {
            movie_id: id.to_string(),
            title: Some("t".to_string()),
            score,
            vote_count: Some(votes),
            release_date: None,
            regions: Some("美国".to_string()),
            types: Some("剧情".to_string()),
            actors: None,
            movie_url: None,
            cover_url: None,
            category: Some("剧情".to_string()),
            category_id: Some("11".to_string()),
            rank_num: Some(1),
        };
        let rows = vec![movie("1", Some(9.7), 100), movie("2", Some(7.1), 5), movie("3", None, 50)];
        let report = assess_movies(&rows);

        assert_eq!(report.complete, 2);
        assert_eq!(
            report.ranges,
            vec![
                NumericRange { column: "score", min: 7.1, max: 9.7 },
                NumericRange { column: "vote_count", min: 5.0, max: 100.0 },
            ]
        );
        let text = report.to_string();
        assert!(text.contains("Total rows: 3"));
        assert!(text.contains("score: 1 (33.33%)"));
    }

    #[test]
    fn empty_table_reports_zeroes() {
        let report = assess_movies(&[]);
        assert_eq!(report.total, 0);
        assert!(report.ranges.is_empty());
        assert!(report.to_string().contains("Complete rows: 0 (0.00%)"));
    }
}
