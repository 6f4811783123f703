use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::storage;

/// Upstream chart API a run harvests from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Netease Cloud Music playlist charts (songs)
    Netease,
    /// Douban movie type rankings (movies)
    Douban,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Netease => "netease",
            Self::Douban => "douban",
        }
    }

    /// Relational table and document-store table name for this source
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Netease => storage::SONGS_TABLE,
            Self::Douban => storage::MOVIES_TABLE,
        }
    }

    pub fn backup_file_name(self) -> &'static str {
        match self {
            Self::Netease => storage::SONGS_BACKUP_FILE,
            Self::Douban => storage::MOVIES_BACKUP_FILE,
        }
    }

    /// Noun used in progress lines
    pub fn item_noun(self) -> &'static str {
        match self {
            Self::Netease => "songs",
            Self::Douban => "movies",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grouping to crawl: a playlist chart or a movie genre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id={})", self.name, self.id)
    }
}
