//! Redb-backed document sink
//!
//! # Tables
//!
//! - `songs`: song id (string) -> CanonicalRecord (JSON)
//! - `movies`: movie id (string) -> CanonicalRecord (JSON)
//!
//! `insert` on an existing key replaces the value, so the latest version of
//! a record wins.

use async_trait::async_trait;
use redb::{Database, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use super::sinks::{DocumentSink, SinkError};
use crate::domain::constants::storage;
use crate::domain::{CanonicalRecord, SourceKind};

const SONGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new(storage::SONGS_TABLE);
const MOVIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new(storage::MOVIES_TABLE);

const SINK_NAME: &str = "redb";

fn table_for(kind: SourceKind) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match kind {
        SourceKind::Netease => SONGS_TABLE,
        SourceKind::Douban => MOVIES_TABLE,
    }
}

fn db_error(context: &str, e: impl std::fmt::Display) -> SinkError {
    SinkError::Document(format!("{context}: {e}"))
}

pub struct RedbDocumentStore {
    // `None` once closed
    db: Mutex<Option<Database>>,
}

impl RedbDocumentStore {
    /// Opens or creates the database at `path` with both tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| db_error("Failed to create store directory", e))?;
            }
        }

        let db = Database::create(path).map_err(|e| db_error("Failed to open database", e))?;
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| db_error("Failed to begin write transaction", e))?;
            write_txn
                .open_table(SONGS_TABLE)
                .map_err(|e| db_error("Failed to create songs table", e))?;
            write_txn
                .open_table(MOVIES_TABLE)
                .map_err(|e| db_error("Failed to create movies table", e))?;
            write_txn
                .commit()
                .map_err(|e| db_error("Failed to commit table creation", e))?;
        }

        info!(path = %path.display(), "document store ready");
        Ok(Self {
            db: Mutex::new(Some(db)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Database>>, SinkError> {
        self.db
            .lock()
            .map_err(|_| SinkError::Document("document store lock poisoned".to_string()))
    }

    /// Stored document for `external_id`, if any
    pub fn get(
        &self,
        kind: SourceKind,
        external_id: &str,
    ) -> Result<Option<CanonicalRecord>, SinkError> {
        let guard = self.lock()?;
        let db = guard.as_ref().ok_or(SinkError::Closed { sink: SINK_NAME })?;

        let read_txn = db
            .begin_read()
            .map_err(|e| db_error("Failed to begin read transaction", e))?;
        let table = read_txn
            .open_table(table_for(kind))
            .map_err(|e| db_error("Failed to open table", e))?;

        match table.get(external_id) {
            Ok(Some(value)) => Ok(Some(serde_json::from_slice(value.value())?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_error("Failed to get document", e)),
        }
    }

    /// Number of documents stored for `kind`
    pub fn count(&self, kind: SourceKind) -> Result<u64, SinkError> {
        let guard = self.lock()?;
        let db = guard.as_ref().ok_or(SinkError::Closed { sink: SINK_NAME })?;

        let read_txn = db
            .begin_read()
            .map_err(|e| db_error("Failed to begin read transaction", e))?;
        let table = read_txn
            .open_table(table_for(kind))
            .map_err(|e| db_error("Failed to open table", e))?;
        table.len().map_err(|e| db_error("Failed to count documents", e))
    }
}

#[async_trait]
impl DocumentSink for RedbDocumentStore {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    async fn upsert(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        let bytes = serde_json::to_vec(record)?;

        let guard = self.lock()?;
        let db = guard.as_ref().ok_or(SinkError::Closed { sink: SINK_NAME })?;

        let write_txn = db
            .begin_write()
            .map_err(|e| db_error("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(table_for(record.source_kind()))
                .map_err(|e| db_error("Failed to open table", e))?;
            table
                .insert(record.external_id.as_str(), bytes.as_slice())
                .map_err(|e| db_error("Failed to write document", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| db_error("Failed to commit document", e))?;
        Ok(())
    }

    async fn close(&self) {
        if let Ok(mut guard) = self.db.lock() {
            // dropping the handle releases the file lock
            guard.take();
        }
    }
}
