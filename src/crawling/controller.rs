//! Pagination and budget controller
//!
//! Drives one run as an explicit state machine:
//!
//! ```text
//! SelectingCategory ──► FetchingPage ──► ProcessingRecords ──► Delaying ──► AdvancingPage ─┐
//!        ▲    │              │                  │                                         │
//!        │    ▼              ▼                  ▼                                         │
//!        │  RunDone     CategoryDone ◄──── CategoryDone           FetchingPage ◄──────────┘
//!        └────────────────────┘
//! ```
//!
//! The run is strictly sequential: one fetch, then each record's sink writes,
//! then one pause, then the next fetch. Exactly one uniform random pause
//! separates any two consecutive requests of a run.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::dedup::DedupIndex;
use super::normalizer::RecordNormalizer;
use super::persistor::{DualSinkPersistor, SinkFailures};
use super::sources::{ChartSource, PageFetch};
use crate::domain::{CanonicalRecord, Category, SourceKind};
use crate::infrastructure::BackupWriter;
use crate::infrastructure::config::{DelayConfig, SourceConfig};

/// What to crawl and within which limits
#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub categories: Vec<Category>,
    pub global_budget: usize,
    pub per_category_budget: Option<usize>,
    pub delay: DelayConfig,
}

impl HarvestPlan {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            categories: config.categories.clone(),
            global_budget: config.budget.global,
            per_category_budget: config.budget.per_category,
            delay: config.delay,
        }
    }
}

/// Why a category stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryEnd {
    /// Short page, or the single response of an unpaginated source
    Exhausted,
    /// The source returned no records
    Empty,
    /// The request failed; treated like `Empty`
    FetchFailed(String),
    CategoryBudget,
    GlobalBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: Category,
    pub pages: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub end: CategoryEnd,
}

impl CategoryReport {
    fn new(category: Category) -> Self {
        Self {
            category,
            pages: 0,
            accepted: 0,
            rejected: 0,
            duplicates: 0,
            end: CategoryEnd::Exhausted,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub source: SourceKind,
    pub total_accepted: usize,
    pub categories: Vec<CategoryReport>,
    pub sink_failures: SinkFailures,
    pub requests: usize,
    pub pauses: usize,
    /// Records in the backup file, or why it could not be written
    pub backup: Result<usize, String>,
}

#[derive(Debug)]
enum HarvestState {
    SelectingCategory,
    FetchingPage { offset: usize },
    ProcessingRecords { offset: usize, records: Vec<Value> },
    Delaying { next_offset: usize },
    AdvancingPage { next_offset: usize },
    CategoryDone { end: CategoryEnd },
    RunDone,
}

pub struct Harvester {
    source: Box<dyn ChartSource>,
    normalizer: RecordNormalizer,
    persistor: DualSinkPersistor,
    backup: BackupWriter,
    plan: HarvestPlan,

    dedup: DedupIndex,
    accepted: Vec<CanonicalRecord>,
    next_category: usize,
    current: Option<CategoryReport>,
    finished: Vec<CategoryReport>,
    sink_failures: SinkFailures,
    requests: usize,
    pauses: usize,
}

impl Harvester {
    pub fn new(
        source: Box<dyn ChartSource>,
        persistor: DualSinkPersistor,
        backup: BackupWriter,
        plan: HarvestPlan,
    ) -> Self {
        let normalizer = RecordNormalizer::for_source(source.kind());
        Self {
            source,
            normalizer,
            persistor,
            backup,
            plan,
            dedup: DedupIndex::new(),
            accepted: Vec::new(),
            next_category: 0,
            current: None,
            finished: Vec::new(),
            sink_failures: SinkFailures::default(),
            requests: 0,
            pauses: 0,
        }
    }

    /// Runs every category to completion, then writes the backup.
    pub async fn run(mut self) -> HarvestReport {
        let kind = self.source.kind();
        info!(
            source = %kind,
            categories = self.plan.categories.len(),
            global_budget = self.plan.global_budget,
            per_category_budget = ?self.plan.per_category_budget,
            "🚀 harvest started"
        );

        let mut state = HarvestState::SelectingCategory;
        loop {
            state = match state {
                HarvestState::SelectingCategory => self.select_category().await,
                HarvestState::FetchingPage { offset } => self.fetch_page(offset).await,
                HarvestState::ProcessingRecords { offset, records } => {
                    self.process_records(offset, records).await
                }
                HarvestState::Delaying { next_offset } => {
                    self.pause().await;
                    HarvestState::AdvancingPage { next_offset }
                }
                HarvestState::AdvancingPage { next_offset } => {
                    HarvestState::FetchingPage {
                        offset: next_offset,
                    }
                }
                HarvestState::CategoryDone { end } => {
                    self.finish_category(end);
                    HarvestState::SelectingCategory
                }
                HarvestState::RunDone => break,
            };
        }

        self.finish().await
    }

    fn total_accepted(&self) -> usize {
        self.accepted.len()
    }

    fn global_budget_hit(&self) -> bool {
        self.total_accepted() >= self.plan.global_budget
    }

    fn category_budget_hit(&self) -> bool {
        match (self.plan.per_category_budget, &self.current) {
            (Some(budget), Some(current)) => current.accepted >= budget,
            _ => false,
        }
    }

    async fn select_category(&mut self) -> HarvestState {
        if self.global_budget_hit() {
            info!(total = self.total_accepted(), "global budget reached");
            return HarvestState::RunDone;
        }
        let Some(category) = self.plan.categories.get(self.next_category).cloned() else {
            return HarvestState::RunDone;
        };
        self.next_category += 1;

        // the previous category's last request still needs its pause
        if self.requests > 0 {
            self.pause().await;
        }

        info!(
            category = %category,
            progress = %format!("{}/{}", self.next_category, self.plan.categories.len()),
            "crawling category"
        );
        self.current = Some(CategoryReport::new(category));
        HarvestState::FetchingPage { offset: 0 }
    }

    async fn fetch_page(&mut self, offset: usize) -> HarvestState {
        let Some(current) = self.current.as_mut() else {
            return HarvestState::SelectingCategory;
        };
        self.requests += 1;
        current.pages += 1;

        match self.source.fetch_page(&current.category, offset).await {
            PageFetch::Records(records) => {
                debug!(offset, records = records.len(), "page fetched");
                HarvestState::ProcessingRecords { offset, records }
            }
            PageFetch::Empty => HarvestState::CategoryDone {
                end: CategoryEnd::Empty,
            },
            PageFetch::Failed(e) => HarvestState::CategoryDone {
                end: CategoryEnd::FetchFailed(e.to_string()),
            },
        }
    }

    async fn process_records(&mut self, offset: usize, records: Vec<Value>) -> HarvestState {
        let page_len = records.len();
        let mut page_accepted = 0;

        for (index, raw) in records.iter().enumerate() {
            if self.global_budget_hit() || self.category_budget_hit() {
                break;
            }
            let Some(current) = self.current.as_mut() else {
                break;
            };

            let rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let record = match self.normalizer.normalize(raw, &current.category, rank) {
                Ok(record) => record,
                Err(e) => {
                    info!(category = %current.category, rank, error = %e, "record rejected");
                    current.rejected += 1;
                    continue;
                }
            };

            if !self.dedup.accept(&record.external_id) {
                current.duplicates += 1;
                continue;
            }

            let outcome = self.persistor.persist(&record).await;
            self.sink_failures.record(outcome);

            current.accepted += 1;
            page_accepted += 1;
            self.accepted.push(record);
        }

        if let Some(current) = &self.current {
            info!(
                category = %current.category.name,
                offset,
                page_accepted,
                category_accepted = current.accepted,
                total = self.total_accepted(),
                "page processed"
            );
        }

        if self.global_budget_hit() {
            return HarvestState::CategoryDone {
                end: CategoryEnd::GlobalBudget,
            };
        }
        if self.category_budget_hit() {
            return HarvestState::CategoryDone {
                end: CategoryEnd::CategoryBudget,
            };
        }
        match self.source.page_size() {
            Some(page_size) if page_len >= page_size => HarvestState::Delaying {
                next_offset: offset + page_size,
            },
            _ => HarvestState::CategoryDone {
                end: CategoryEnd::Exhausted,
            },
        }
    }

    async fn pause(&mut self) {
        let pause = self.plan.delay.sample();
        self.pauses += 1;
        if pause > Duration::ZERO {
            debug!(pause_ms = pause.as_millis() as u64, "pausing");
            tokio::time::sleep(pause).await;
        }
    }

    fn finish_category(&mut self, end: CategoryEnd) {
        let Some(mut current) = self.current.take() else {
            return;
        };
        match &end {
            CategoryEnd::FetchFailed(reason) => {
                warn!(category = %current.category, reason = %reason, "category skipped after failed fetch");
            }
            CategoryEnd::Empty if current.accepted == 0 => {
                info!(category = %current.category, "category returned no data");
            }
            _ => {
                info!(
                    category = %current.category,
                    accepted = current.accepted,
                    rejected = current.rejected,
                    duplicates = current.duplicates,
                    end = ?end,
                    "category done"
                );
            }
        }
        current.end = end;
        self.finished.push(current);
    }

    async fn finish(self) -> HarvestReport {
        let kind = self.source.kind();
        let backup = self
            .backup
            .write(&self.accepted)
            .await
            .map_err(|e| {
                warn!(path = %self.backup.path().display(), error = %e, "backup write failed");
                e.to_string()
            });

        info!(
            source = %kind,
            total = self.total_accepted(),
            requests = self.requests,
            relational_failures = self.sink_failures.relational,
            document_failures = self.sink_failures.document,
            "✅ harvest finished: {} {}",
            self.total_accepted(),
            kind.item_noun()
        );

        HarvestReport {
            source: kind,
            total_accepted: self.accepted.len(),
            categories: self.finished,
            sink_failures: self.sink_failures,
            requests: self.requests,
            pauses: self.pauses,
            backup,
        }
    }
}
