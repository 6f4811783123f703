//! Persistence seams for harvested records
//!
//! The relational sink keeps the first-seen version of a record, the document
//! sink keeps the latest. Both are closed explicitly at the end of a run.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CanonicalRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("relational store error: {0}")]
    Relational(#[from] sqlx::Error),

    #[error("document store error: {0}")]
    Document(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{sink} is closed")]
    Closed { sink: &'static str },
}

/// Insert-if-absent store keyed on the external id
#[async_trait]
pub trait RelationalSink: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &'static str {
        "relational"
    }

    /// Returns `true` when a new row was written, `false` when the id already existed
    async fn insert_if_absent(&self, record: &CanonicalRecord) -> Result<bool, SinkError>;

    async fn close(&self);
}

/// Upsert store keyed on the external id
#[async_trait]
pub trait DocumentSink: Send + Sync {
    fn name(&self) -> &'static str {
        "document"
    }

    /// Writes the record, replacing any stored document with the same id
    async fn upsert(&self, record: &CanonicalRecord) -> Result<(), SinkError>;

    async fn close(&self);
}
