//! Harvest pipeline
//!
//! fetch → normalize → dedup → dual-sink persist, driven per category and
//! per page by the [`Harvester`] under global and per-category budgets.

pub mod controller;
pub mod dedup;
pub mod normalizer;
pub mod persistor;
pub mod sources;

pub use controller::{CategoryEnd, CategoryReport, HarvestPlan, HarvestReport, Harvester};
pub use dedup::DedupIndex;
pub use normalizer::{NormalizeError, RecordNormalizer};
pub use persistor::{DualSinkPersistor, PersistOutcome, SinkFailures};
pub use sources::{ChartSource, PageFetch, build_source};
