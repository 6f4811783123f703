//! Douban movie type rankings
//!
//! `GET {endpoint}?type=..&interval_id=..&action=&start=..&limit=..` answers
//! a bare JSON array; a page shorter than `limit` is the last one.

use async_trait::async_trait;
use serde_json::Value;

use super::{ChartSource, PageFetch};
use crate::domain::constants::douban;
use crate::domain::{Category, SourceKind};
use crate::infrastructure::{FetchError, HttpClient, SourceConfig};

pub struct DoubanSource {
    client: HttpClient,
    endpoint: String,
    interval_id: String,
    page_size: usize,
}

impl DoubanSource {
    pub fn new(
        client: HttpClient,
        endpoint: impl Into<String>,
        interval_id: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            interval_id: interval_id.into(),
            page_size,
        }
    }

    pub fn from_config(client: HttpClient, config: &SourceConfig) -> Self {
        Self::new(
            client,
            config.endpoint.clone(),
            config
                .interval_id
                .clone()
                .unwrap_or_else(|| douban::DEFAULT_INTERVAL_ID.to_string()),
            config.page_size.unwrap_or(douban::PAGE_SIZE),
        )
    }

    /// Query string for one ranking page, in the order the site sends it
    pub fn query(&self, category: &Category, offset: usize) -> Vec<(&'static str, String)> {
        vec![
            ("type", category.id.clone()),
            ("interval_id", self.interval_id.clone()),
            ("action", String::new()),
            ("start", offset.to_string()),
            ("limit", self.page_size.to_string()),
        ]
    }

    pub fn extract_movies(body: Value) -> Result<Vec<Value>, FetchError> {
        match body {
            Value::Array(movies) => Ok(movies),
            _ => Err(FetchError::UnexpectedShape(
                "top list response is not an array".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ChartSource for DoubanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Douban
    }

    fn page_size(&self) -> Option<usize> {
        Some(self.page_size)
    }

    async fn fetch_page(&self, category: &Category, offset: usize) -> PageFetch {
        let query = self.query(category, offset);
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let result = self
            .client
            .get_json(&self.endpoint, &query, SourceKind::Douban)
            .await
            .and_then(Self::extract_movies);
        PageFetch::from_result(result, category)
    }
}
