//! Upstream chart sources
//!
//! A source turns `(category, offset)` into one page of raw records. It never
//! returns an error to the caller: failures come back as [`PageFetch::Failed`]
//! after being logged, so the controller can move on.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::domain::{Category, SourceKind};
use crate::infrastructure::{FetchError, HttpClient, SourceConfig};

pub mod douban;
pub mod netease;

pub use douban::DoubanSource;
pub use netease::NeteaseSource;

/// Outcome of one page request
#[derive(Debug)]
pub enum PageFetch {
    /// Raw records in source order; never empty
    Records(Vec<Value>),
    /// The source had nothing (more) for this category
    Empty,
    /// Transport, status or payload failure
    Failed(FetchError),
}

impl PageFetch {
    /// Wraps a source result, logging failures with their category
    pub fn from_result(result: Result<Vec<Value>, FetchError>, category: &Category) -> Self {
        match result {
            Ok(records) if records.is_empty() => Self::Empty,
            Ok(records) => Self::Records(records),
            Err(e) => {
                warn!(category = %category, error = %e, "page fetch failed");
                Self::Failed(e)
            }
        }
    }
}

#[async_trait]
pub trait ChartSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Nominal records per page; `None` when one request returns the whole category
    fn page_size(&self) -> Option<usize>;

    async fn fetch_page(&self, category: &Category, offset: usize) -> PageFetch;
}

/// Builds the HTTP-backed source for `kind`
pub fn build_source(kind: SourceKind, config: &SourceConfig, client: HttpClient) -> Box<dyn ChartSource> {
    match kind {
        SourceKind::Netease => Box::new(NeteaseSource::new(client, config.endpoint.clone())),
        SourceKind::Douban => Box::new(DoubanSource::from_config(client, config)),
    }
}
