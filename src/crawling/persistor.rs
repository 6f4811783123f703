//! Dual-sink persistence
//!
//! Every accepted record is written to the relational sink and the document
//! sink independently. A failing sink is logged and reported, never raised.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::CanonicalRecord;
use crate::infrastructure::{DocumentSink, RelationalSink};

/// Per-sink result of persisting one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub relational_ok: bool,
    pub document_ok: bool,
}

impl PersistOutcome {
    pub fn fully_persisted(&self) -> bool {
        self.relational_ok && self.document_ok
    }
}

/// Running totals of sink failures across a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkFailures {
    pub relational: usize,
    pub document: usize,
}

impl SinkFailures {
    pub fn record(&mut self, outcome: PersistOutcome) {
        if !outcome.relational_ok {
            self.relational += 1;
        }
        if !outcome.document_ok {
            self.document += 1;
        }
    }
}

#[derive(Clone)]
pub struct DualSinkPersistor {
    relational: Arc<dyn RelationalSink>,
    document: Arc<dyn DocumentSink>,
}

impl DualSinkPersistor {
    pub fn new(relational: Arc<dyn RelationalSink>, document: Arc<dyn DocumentSink>) -> Self {
        Self {
            relational,
            document,
        }
    }

    pub async fn persist(&self, record: &CanonicalRecord) -> PersistOutcome {
        let relational_ok = match self.relational.insert_if_absent(record).await {
            Ok(inserted) => {
                debug!(external_id = %record.external_id, inserted, sink = self.relational.name(), "relational write");
                true
            }
            Err(e) => {
                warn!(
                    external_id = %record.external_id,
                    title = %record.primary_label,
                    sink = self.relational.name(),
                    error = %e,
                    "relational write failed"
                );
                false
            }
        };

        let document_ok = match self.document.upsert(record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    external_id = %record.external_id,
                    title = %record.primary_label,
                    sink = self.document.name(),
                    error = %e,
                    "document write failed"
                );
                false
            }
        };

        PersistOutcome {
            relational_ok,
            document_ok,
        }
    }

    /// Closes both sinks; safe to call more than once
    pub async fn close(&self) {
        self.relational.close().await;
        self.document.close().await;
        debug!("sinks closed");
    }
}
