//! Post-harvest analysis: quality report and cleaned exports
//!
//! Reads back what the relational store holds for one source, prints a
//! quality report and writes cleaned JSON / CSV next to the backup file.

pub mod cleaning;
pub mod quality;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub use cleaning::{CleanedFiles, CleaningSummary, ExportError, clean_movies, clean_songs, write_cleaned};
pub use quality::{QualityReport, QualityRow, assess_movies, assess_songs};

use crate::domain::SourceKind;
use crate::infrastructure::SqliteRelationalStore;

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub quality: QualityReport,
    pub cleaning: CleaningSummary,
    pub files: CleanedFiles,
}

/// Assesses and cleans everything stored for `kind`, exporting into `data_dir`
pub async fn analyze(
    kind: SourceKind,
    store: &SqliteRelationalStore,
    data_dir: &Path,
) -> Result<AnalysisOutcome> {
    let stem = kind.table_name();
    let (quality, cleaning, files) = match kind {
        SourceKind::Netease => {
            let rows = store.load_songs().await.context("Failed to load songs")?;
            let quality = assess_songs(&rows);
            let (cleaned, summary) = clean_songs(rows);
            let files = write_cleaned(&cleaned, data_dir, stem)?;
            (quality, summary, files)
        }
        SourceKind::Douban => {
            let rows = store.load_movies().await.context("Failed to load movies")?;
            let quality = assess_movies(&rows);
            let (cleaned, summary) = clean_movies(rows);
            let files = write_cleaned(&cleaned, data_dir, stem)?;
            (quality, summary, files)
        }
    };

    info!(
        source = %kind,
        rows = quality.total,
        duplicates_removed = cleaning.duplicates_removed,
        out_of_range_removed = cleaning.out_of_range_removed,
        output = cleaning.output,
        json = %files.json.display(),
        csv = %files.csv.display(),
        "cleaned export written"
    );

    Ok(AnalysisOutcome {
        quality,
        cleaning,
        files,
    })
}
