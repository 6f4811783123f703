//! Shared fixtures for pipeline tests: a scripted source, sink doubles and
//! a config rooted in a temporary directory.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chart_harvester::crawling::{ChartSource, PageFetch};
use chart_harvester::infrastructure::config::{BudgetConfig, DelayConfig};
use chart_harvester::infrastructure::{DocumentSink, FetchError, RelationalSink, SinkError};
use chart_harvester::{CanonicalRecord, Category, HarvestConfig, SourceKind};

pub enum Script {
    Page(Vec<Value>),
    Fail,
    Panic,
}

/// Serves scripted pages keyed by (category id, offset); anything unscripted is empty
pub struct ScriptedSource {
    kind: SourceKind,
    page_size: Option<usize>,
    script: HashMap<(String, usize), Script>,
    pub requests: Arc<Mutex<Vec<(String, usize)>>>,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind, page_size: Option<usize>) -> Self {
        Self {
            kind,
            page_size,
            script: HashMap::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn page(mut self, category_id: &str, offset: usize, records: Vec<Value>) -> Self {
        self.script
            .insert((category_id.to_string(), offset), Script::Page(records));
        self
    }

    pub fn failing(mut self, category_id: &str, offset: usize) -> Self {
        self.script.insert((category_id.to_string(), offset), Script::Fail);
        self
    }

    pub fn panicking(mut self, category_id: &str, offset: usize) -> Self {
        self.script.insert((category_id.to_string(), offset), Script::Panic);
        self
    }

    pub fn request_log(&self) -> Arc<Mutex<Vec<(String, usize)>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl ChartSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    async fn fetch_page(&self, category: &Category, offset: usize) -> PageFetch {
        self.requests
            .lock()
            .unwrap()
            .push((category.id.clone(), offset));
        match self.script.get(&(category.id.clone(), offset)) {
            Some(Script::Page(records)) if !records.is_empty() => PageFetch::Records(records.clone()),
            Some(Script::Fail) => PageFetch::Failed(FetchError::Status {
                status: 503,
                url: format!("http://test/{}", category.id),
            }),
            Some(Script::Panic) => panic!("scripted panic in fetch"),
            _ => PageFetch::Empty,
        }
    }
}

/// Relational sink that rejects every write
#[derive(Default)]
pub struct FailingRelational {
    pub attempts: AtomicUsize,
    pub closed: AtomicBool,
}

#[async_trait]
impl RelationalSink for FailingRelational {
    async fn insert_if_absent(&self, _record: &CanonicalRecord) -> Result<bool, SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Relational(sqlx::Error::PoolClosed))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Document sink that keeps everything in memory and remembers being closed
#[derive(Default)]
pub struct RecordingDocument {
    pub documents: Mutex<HashMap<String, CanonicalRecord>>,
    pub closed: AtomicBool,
}

#[async_trait]
impl DocumentSink for RecordingDocument {
    async fn upsert(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        self.documents
            .lock()
            .unwrap()
            .insert(record.external_id.to_string(), record.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Config with every path under `root`, no delays and the given categories
pub fn test_config(
    root: &Path,
    kind: SourceKind,
    categories: &[(&str, &str)],
    global: usize,
    per_category: Option<usize>,
) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.storage.database_url = format!("sqlite:{}", root.join("data/harvest.db").display());
    config.storage.document_store_path = root.join("data/documents.redb");
    config.storage.data_dir = root.join("data");
    config.storage.output_dir = root.join("output");

    let source = match kind {
        SourceKind::Netease => &mut config.netease,
        SourceKind::Douban => &mut config.douban,
    };
    source.categories = categories
        .iter()
        .map(|(id, name)| Category::new(*id, *name))
        .collect();
    source.budget = BudgetConfig {
        global,
        per_category,
    };
    source.delay = DelayConfig::NONE;
    config
}

pub fn read_backup(config: &HarvestConfig, kind: SourceKind) -> Vec<CanonicalRecord> {
    let text = std::fs::read_to_string(config.backup_path(kind)).unwrap();
    serde_json::from_str(&text).unwrap()
}
