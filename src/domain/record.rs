//! Canonical record produced by the normalizer
//!
//! A record is built once per raw upstream item and never mutated afterwards.
//! Field order here is the field order of the backup file.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::SourceKind;

/// Upstream primary key; the only identity of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Returns `None` for blank identifiers
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(Self(raw))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source-specific attributes carried alongside the shared fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum RecordDetails {
    #[serde(rename = "netease")]
    Song {
        artist_id: i64,
        album_name: String,
        album_id: i64,
        duration_secs: i64,
    },
    #[serde(rename = "douban")]
    Movie {
        score: f64,
        vote_count: i64,
        release_date: String,
        regions: String,
        types: String,
        movie_url: String,
        cover_url: String,
    },
}

impl RecordDetails {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Song { .. } => SourceKind::Netease,
            Self::Movie { .. } => SourceKind::Douban,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub external_id: ExternalId,
    /// Song title or movie title
    pub primary_label: String,
    /// Artists or actors joined with `/`; empty when none are listed
    pub attribution: String,
    /// Playlist name or genre name the record was discovered under
    pub grouping_label: String,
    pub grouping_id: String,
    /// 1-based position within the fetched page
    pub rank: u32,
    #[serde(flatten)]
    pub details: RecordDetails,
}

impl CanonicalRecord {
    pub fn source_kind(&self) -> SourceKind {
        self.details.source_kind()
    }
}
