//! Chart Harvester - rate-limited, deduplicated harvesting of ranked lists
//!
//! Crawls Netease Cloud Music playlist charts (songs) and Douban genre
//! rankings (movies), normalizes each item into a canonical record and
//! persists it to SQLite and redb, with a JSON backup per run.

// Module declarations
pub mod analysis;
pub mod application;
pub mod crawling;
pub mod domain;
pub mod infrastructure;

pub use crawling::{HarvestReport, Harvester};
pub use domain::{CanonicalRecord, Category, SourceKind};
pub use infrastructure::HarvestConfig;
